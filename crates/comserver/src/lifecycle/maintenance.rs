//! Periodic maintenance tick
//!
//! References are released when the last owner drops them, so the tick
//! is not needed for correct shutdown. It reports server liveness and
//! gives embedders a hook to reclaim references held on behalf of
//! clients that went away.

use tracing::debug;
use crate::tracker::ReferenceTracker;

/// Work run on every maintenance tick
pub trait MaintenanceTask: Send + Sync + 'static {
    /// Called once per tick
    fn tick(&self, tracker: &ReferenceTracker);
}

/// Default task: log the outstanding reference count
#[derive(Clone, Copy, Debug, Default)]
pub struct TrackerReport;

impl MaintenanceTask for TrackerReport {
    fn tick(&self, tracker: &ReferenceTracker) {
        debug!(
            live = tracker.count(),
            gate = ?tracker.gate_state(),
            "maintenance tick"
        );
    }
}

impl<F> MaintenanceTask for F
where
    F: Fn(&ReferenceTracker) + Send + Sync + 'static,
{
    fn tick(&self, tracker: &ReferenceTracker) {
        self(tracker)
    }
}
