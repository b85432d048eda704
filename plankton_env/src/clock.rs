//! Time source trait for the simulation run loop.

use std::time::Duration;

/// The time source that paces a simulation.
///
/// The run loop only ever asks two questions of time: "how long since I last
/// looked" and "wait this long". Abstracting both lets the same scheduler run
/// against the wall clock in production and against a virtual clock in tests.
///
/// # Implementations
///
/// - **Production**: [`SystemClock`](crate::SystemClock) - wraps `Instant` and `thread::sleep`
/// - **Testing**: `VirtualClock` in `plankton_sim` - `sleep` advances virtual time
pub trait Clock: Send + Sync + 'static {
    /// Returns the monotonic time elapsed since the clock was created.
    fn now(&self) -> Duration;

    /// Blocks the calling thread for the given duration.
    ///
    /// A virtual clock advances its time instead of blocking.
    fn sleep(&self, duration: Duration);
}

impl<K: Clock> Clock for std::sync::Arc<K> {
    fn now(&self) -> Duration {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}
