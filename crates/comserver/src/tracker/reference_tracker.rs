//! Server-wide reference tracking
//!
//! One counter covers every outstanding reference the server has handed
//! out: explicit `LockServer` pins from the activation runtime and one
//! count per live served object. The gate opens the first time the count
//! falls back to zero after having been above zero.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use parking_lot::{Condvar, Mutex};
use tokio::sync::Notify;
use tracing::{error, info, trace};

/// Gate state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateState {
    /// Waiting for the count to return to zero
    Blocked,
    /// The count has crossed zero from above
    Released,
}

/// One-shot gate, waitable from both threads and tasks
struct Gate {
    state: Mutex<GateState>,
    cond: Condvar,
    notify: Notify,
}

impl Gate {
    fn new() -> Self {
        Self {
            state: Mutex::new(GateState::Blocked),
            cond: Condvar::new(),
            notify: Notify::new(),
        }
    }

    /// Release the gate. Returns false if it was already released.
    fn release(&self) -> bool {
        {
            let mut state = self.state.lock();
            if *state == GateState::Released {
                return false;
            }
            *state = GateState::Released;
        }
        self.cond.notify_all();
        self.notify.notify_waiters();
        true
    }

    fn state(&self) -> GateState {
        *self.state.lock()
    }
}

/// Atomic reference counter plus shutdown gate
pub struct ReferenceTracker {
    /// Outstanding references
    count: AtomicUsize,
    /// Set by the first increment
    engaged: AtomicBool,
    /// Number of times the count has fallen to zero
    zero_crossings: AtomicUsize,
    /// Serial numbers for tracking handles
    next_serial: AtomicU64,
    gate: Gate,
}

impl ReferenceTracker {
    /// Create a tracker with a zero count and a blocked gate
    pub fn new() -> Self {
        Self {
            count: AtomicUsize::new(0),
            engaged: AtomicBool::new(false),
            zero_crossings: AtomicUsize::new(0),
            next_serial: AtomicU64::new(1),
            gate: Gate::new(),
        }
    }

    /// Add one reference, returning the new count
    pub fn increment(&self) -> usize {
        self.engaged.store(true, Ordering::Release);
        let count = self.count.fetch_add(1, Ordering::AcqRel) + 1;
        trace!(count, "reference added");
        count
    }

    /// Drop one reference, returning the new count
    ///
    /// The transition to zero releases the gate. Only the first such
    /// transition has an effect on the gate; it never closes again.
    pub fn decrement(&self) -> usize {
        match self
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| c.checked_sub(1))
        {
            Ok(previous) => {
                let count = previous - 1;
                trace!(count, "reference released");
                if count == 0 {
                    self.zero_crossings.fetch_add(1, Ordering::AcqRel);
                    if self.gate.release() {
                        info!("reference count reached zero, releasing shutdown gate");
                    }
                }
                count
            }
            Err(_) => {
                error!("unpaired decrement: reference count is already zero");
                0
            }
        }
    }

    /// Current count
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Whether any reference has ever been taken
    pub fn has_engaged(&self) -> bool {
        self.engaged.load(Ordering::Acquire)
    }

    /// Number of times the count has fallen back to zero
    pub fn zero_crossings(&self) -> usize {
        self.zero_crossings.load(Ordering::Acquire)
    }

    /// Current gate state
    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    /// Check if the gate has been released
    pub fn is_released(&self) -> bool {
        self.gate_state() == GateState::Released
    }

    pub(crate) fn next_serial(&self) -> u64 {
        self.next_serial.fetch_add(1, Ordering::Relaxed)
    }

    /// Block the calling thread until the gate is released
    pub fn await_zero(&self) {
        let mut state = self.gate.state.lock();
        while *state == GateState::Blocked {
            self.gate.cond.wait(&mut state);
        }
    }

    /// Block until the gate is released or `timeout` elapses
    ///
    /// Returns true if the gate was released.
    pub fn await_zero_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.gate.state.lock();
        while *state == GateState::Blocked {
            if self.gate.cond.wait_until(&mut state, deadline).timed_out() {
                return *state == GateState::Released;
            }
        }
        true
    }

    /// Wait asynchronously until the gate is released
    pub async fn released(&self) {
        loop {
            let notified = self.gate.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_released() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for ReferenceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ReferenceTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceTracker")
            .field("count", &self.count())
            .field("gate", &self.gate_state())
            .finish()
    }
}
