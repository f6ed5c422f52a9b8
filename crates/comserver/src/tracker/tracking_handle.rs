//! Per-object tracking tokens

use std::sync::{Arc, Weak};
use super::reference_tracker::ReferenceTracker;

/// Token held for the lifetime of one served object
///
/// Construction takes one reference on the tracker; drop gives it back.
/// The handle only observes the tracker, so a handle outliving its
/// tracker drops silently.
#[derive(Debug)]
pub struct TrackingHandle {
    tracker: Weak<ReferenceTracker>,
    serial: u64,
}

impl TrackingHandle {
    /// Take one reference on `tracker`
    pub fn acquire(tracker: &Arc<ReferenceTracker>) -> Self {
        tracker.increment();
        Self {
            tracker: Arc::downgrade(tracker),
            serial: tracker.next_serial(),
        }
    }

    /// Serial number, unique per tracker
    pub fn serial(&self) -> u64 {
        self.serial
    }
}

impl Drop for TrackingHandle {
    fn drop(&mut self) {
        if let Some(tracker) = self.tracker.upgrade() {
            tracker.decrement();
        }
    }
}
