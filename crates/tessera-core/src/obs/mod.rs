//! Observability: in-process counters behind an event sink boundary.
//!
//! Core logic records [`QueryEvent`]s through `sink::record`; it never touches
//! `metrics` state directly.

pub(crate) mod metrics;
pub(crate) mod sink;

// re-exports
pub use metrics::{BackendCounters, EventOps, EventReport};
pub use sink::{EventSink, QueryEvent, metrics_report, metrics_reset_all, with_event_sink};
