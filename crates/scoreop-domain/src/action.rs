use std::time::Duration;

/// What a reconciler asks of the host scheduler after handling one event.
///
/// `RequeueAfter` is advisory; the host may coalesce duplicate requests for
/// the same object key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    /// Nothing left to do until the next watch event.
    Done,
    /// Run again as soon as a worker is free.
    Requeue,
    /// Run again after the given delay.
    RequeueAfter(Duration),
}

impl ReconcileAction {
    pub fn after_secs(secs: u64) -> Self {
        ReconcileAction::RequeueAfter(Duration::from_secs(secs))
    }

    pub fn requeue_after(&self) -> Option<Duration> {
        match self {
            ReconcileAction::RequeueAfter(d) => Some(*d),
            _ => None,
        }
    }
}
