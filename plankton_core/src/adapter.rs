//! Protocol adapters: the boundary between a device and the outside world.

use crate::device::Device;
use crate::error::AdapterError;
use std::time::Duration;

/// Exposes a device through some communication protocol.
///
/// The scheduler calls [`Adapter::start_server`] once before the first
/// cycle, then [`Adapter::handle`] once per cycle on the simulation thread.
/// Adapters never touch the device outside of `handle`.
pub trait Adapter: Send {
    /// Protocol name, e.g. `"stream"` or `"monitor"`.
    fn protocol(&self) -> &str;

    /// Description of what the adapter exposes.
    fn documentation(&self) -> String {
        String::new()
    }

    /// Starts whatever infrastructure the protocol needs.
    ///
    /// Must be idempotent; startup work does not happen on construction so
    /// the caller controls when services come up.
    fn start_server(&mut self) -> Result<(), AdapterError> {
        Ok(())
    }

    /// Services pending protocol work against `device`.
    ///
    /// Should take roughly `budget` of wall time, but may return early or
    /// somewhat late. Malformed requests and transient I/O problems are
    /// handled here; `Err` means the adapter cannot continue and ends the run.
    fn handle(&mut self, device: &mut dyn Device, budget: Duration) -> Result<(), AdapterError>;
}

impl<A: Adapter + ?Sized> Adapter for Box<A> {
    fn protocol(&self) -> &str {
        (**self).protocol()
    }

    fn documentation(&self) -> String {
        (**self).documentation()
    }

    fn start_server(&mut self) -> Result<(), AdapterError> {
        (**self).start_server()
    }

    fn handle(&mut self, device: &mut dyn Device, budget: Duration) -> Result<(), AdapterError> {
        (**self).handle(device, budget)
    }
}

/// An adapter that exposes nothing.
#[derive(Debug, Clone, Default)]
pub struct NullAdapter;

impl Adapter for NullAdapter {
    fn protocol(&self) -> &str {
        "none"
    }

    fn handle(&mut self, _: &mut dyn Device, _: Duration) -> Result<(), AdapterError> {
        Ok(())
    }
}
