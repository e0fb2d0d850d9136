//! Event sink boundary.
//!
//! All instrumentation flows through [`QueryEvent`] and [`EventSink`]. This
//! module is the only bridge between core logic and the metrics state.

use crate::{
    discovery::ExtensionPoint,
    obs::metrics::{self, EventReport, bump},
    query::{DataModel, Verb},
};
use std::{cell::RefCell, sync::Arc};

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<Arc<dyn EventSink>>> = RefCell::new(None);
}

///
/// QueryEvent
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum QueryEvent {
    Bind {
        placeholders: u64,
        ok: bool,
    },
    DiscoveryScan {
        point: ExtensionPoint,
        providers: u64,
    },
    Execute {
        verb: Verb,
        backend: String,
        records: u64,
    },
    ExecuteFailed {
        verb: Verb,
        backend: String,
    },
    Parse {
        model: DataModel,
        ok: bool,
    },
}

///
/// EventSink
///

pub trait EventSink {
    fn record(&self, event: &QueryEvent);
}

/// Default sink writing into thread-local metrics state.
pub(crate) struct GlobalEventSink;

impl EventSink for GlobalEventSink {
    fn record(&self, event: &QueryEvent) {
        metrics::with_state_mut(|m| match event {
            QueryEvent::Bind { ok, .. } => {
                bump(&mut m.ops.bind_calls, 1);
                if !ok {
                    bump(&mut m.ops.bind_errors, 1);
                }
            }

            QueryEvent::DiscoveryScan { providers, .. } => {
                bump(&mut m.ops.discovery_scans, 1);
                bump(&mut m.ops.providers_found, *providers);
            }

            QueryEvent::Execute {
                verb,
                backend,
                records,
            } => {
                let counter = match verb {
                    Verb::Del => &mut m.ops.del_calls,
                    Verb::Delete => &mut m.ops.delete_calls,
                    Verb::Get => &mut m.ops.get_calls,
                    Verb::Insert => &mut m.ops.insert_calls,
                    Verb::Put => &mut m.ops.put_calls,
                    Verb::Select => &mut m.ops.select_calls,
                    Verb::Update => &mut m.ops.update_calls,
                };
                bump(counter, 1);
                bump(&mut m.ops.records_returned, *records);

                let entry = m.backends.entry(backend.clone()).or_default();
                bump(&mut entry.executions, 1);
                bump(&mut entry.records_returned, *records);
            }

            QueryEvent::ExecuteFailed { backend, .. } => {
                bump(&mut m.ops.execution_errors, 1);
                let entry = m.backends.entry(backend.clone()).or_default();
                bump(&mut entry.execution_errors, 1);
            }

            QueryEvent::Parse { ok, .. } => {
                bump(&mut m.ops.parse_calls, 1);
                if !ok {
                    bump(&mut m.ops.parse_errors, 1);
                }
            }
        });
    }
}

pub(crate) fn record(event: &QueryEvent) {
    let sink = SINK_OVERRIDE.with(|cell| cell.borrow().clone());
    match sink {
        Some(sink) => sink.record(event),
        None => GlobalEventSink.record(event),
    }
}

/// Snapshot the current thread's counters.
#[must_use]
pub fn metrics_report() -> EventReport {
    metrics::report()
}

/// Reset all counters.
pub fn metrics_reset_all() {
    metrics::reset_all();
}

/// Run a closure with a temporary sink override on this thread. The
/// previous sink is restored on every exit, including unwind.
pub fn with_event_sink<T>(sink: Arc<dyn EventSink>, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<Arc<dyn EventSink>>);

    impl Drop for Guard {
        fn drop(&mut self) {
            let prev = self.0.take();
            SINK_OVERRIDE.with(|cell| {
                *cell.borrow_mut() = prev;
            });
        }
    }

    let prev = SINK_OVERRIDE.with(|cell| cell.borrow_mut().replace(sink));
    let _guard = Guard(prev);

    f()
}

///
/// TESTS
///
