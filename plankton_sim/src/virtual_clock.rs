//! Virtual time source for deterministic scheduler runs.

use plankton_env::Clock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Clock whose time only moves when told to.
///
/// `sleep` advances virtual time instead of blocking, so a run loop paced by
/// this clock sees exactly the cycle delays it asked for. Clones share the
/// same time line.
#[derive(Debug, Clone, Default)]
pub struct VirtualClock {
    /// Current virtual time (nanoseconds since creation)
    time_ns: Arc<AtomicU64>,
}

impl VirtualClock {
    /// Creates a clock at virtual time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an Arc-wrapped clock for sharing.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Advances virtual time by the given duration.
    pub fn advance(&self, duration: Duration) {
        self.time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
    }

    /// Sets the virtual time to a specific value.
    pub fn set_time(&self, time_ns: u64) {
        self.time_ns.store(time_ns, Ordering::SeqCst);
    }

    /// Returns the current virtual time in nanoseconds.
    pub fn time_ns(&self) -> u64 {
        self.time_ns.load(Ordering::SeqCst)
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.time_ns())
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}
