use serde::{Deserialize, Serialize};
use std::{
    cell::RefCell,
    collections::BTreeMap,
    time::{SystemTime, UNIX_EPOCH},
};

///
/// EventState
/// Ephemeral, thread-local counters.
///

#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct EventState {
    pub ops: EventOps,
    pub backends: BTreeMap<String, BackendCounters>,
    pub since_ms: u64,
}

impl Default for EventState {
    fn default() -> Self {
        Self {
            ops: EventOps::default(),
            backends: BTreeMap::new(),
            since_ms: now_millis(),
        }
    }
}

///
/// EventOps
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct EventOps {
    // Parsing
    pub parse_calls: u64,
    pub parse_errors: u64,

    // Binding
    pub bind_calls: u64,
    pub bind_errors: u64,

    // Execution by verb
    pub select_calls: u64,
    pub insert_calls: u64,
    pub update_calls: u64,
    pub delete_calls: u64,
    pub put_calls: u64,
    pub get_calls: u64,
    pub del_calls: u64,
    pub execution_errors: u64,
    pub records_returned: u64,

    // Discovery
    pub discovery_scans: u64,
    pub providers_found: u64,
}

///
/// BackendCounters
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct BackendCounters {
    pub executions: u64,
    pub execution_errors: u64,
    pub records_returned: u64,
}

///
/// EventReport
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct EventReport {
    pub ops: EventOps,
    pub backends: BTreeMap<String, BackendCounters>,
    pub since_ms: u64,
}

thread_local! {
    static EVENT_STATE: RefCell<EventState> = RefCell::new(EventState::default());
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// Borrow metrics immutably.
pub(crate) fn with_state<R>(f: impl FnOnce(&EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&m.borrow()))
}

/// Borrow metrics mutably.
pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&mut m.borrow_mut()))
}

/// Reset all counters and restart the window.
pub(crate) fn reset_all() {
    with_state_mut(|m| *m = EventState::default());
}

pub(crate) fn report() -> EventReport {
    with_state(|m| EventReport {
        ops: m.ops.clone(),
        backends: m.backends.clone(),
        since_ms: m.since_ms,
    })
}

pub(crate) const fn bump(counter: &mut u64, by: u64) {
    *counter = counter.saturating_add(by);
}
