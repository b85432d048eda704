//! plankton Simulator - runs a simulated device behind a protocol adapter
//!
//! The [`Simulation`] loop owns one device and one adapter. Every cycle it
//!
//! 1. advances the device by the elapsed wall time times the speed factor,
//! 2. lets the adapter service its protocol for about one cycle delay,
//! 3. applies queued control commands (pause, speed, stop, ...).
//!
//! Control commands arrive through a [`ControlHandle`](plankton_env::ControlHandle),
//! either in-process or from the optional TCP [`ControlServer`].
//!
//! # Usage
//!
//! ```no_run
//! use plankton_sim::{Registry, Simulation, SimulationConfig};
//!
//! # fn main() -> Result<(), plankton_sim::SimulationError> {
//! let registry = Registry::builtin();
//! let device = registry.create_device("linkam_t95", Some("warm"))?;
//! let adapter = registry.create_adapter("linkam_t95", device.as_ref(), None, &[])?;
//!
//! let mut simulation = Simulation::new(device, adapter, SimulationConfig::default())?;
//! simulation.start()?;
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod control_server;
pub mod devices;
pub mod registry;
pub mod simulation;
mod virtual_clock;

pub use adapters::MonitorAdapter;
pub use control_server::ControlServer;
pub use registry::{DeviceEntry, Registry};
pub use simulation::{Simulation, SimulationConfig, SimulationError};
pub use virtual_clock::VirtualClock;
