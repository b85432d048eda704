//! plankton Environment Abstraction Layer
//!
//! This crate holds the pieces of a simulation that touch the outside world,
//! so that the engine in `plankton_core` stays pure and the scheduler in
//! `plankton_sim` can be driven by either real or virtual time:
//!
//! - **Time**: [`Clock`] (`now()`, `sleep()`), with [`SystemClock`] as the
//!   wall-clock implementation.
//! - **Control**: the command vocabulary of the remote control channel and the
//!   single-consumer queue that hands commands to the run loop.
//!
//! # Control flow
//!
//! ```text
//! listener thread                         run loop (single thread)
//!   |                                        |
//!   |-- ControlHandle::set_speed(2.0) ------>|  queued
//!   |-- ControlHandle::stop() -------------->|  queued
//!   |                                        |-- advance device
//!   |                                        |-- service adapter
//!   |                                        |-- ControlQueue::try_next() x N
//! ```
//!
//! Commands are never applied while the device is being advanced or the
//! adapter is being serviced.

mod clock;
mod control;
mod error;
mod system;
mod types;

pub use clock::Clock;
pub use control::{
    control_channel, validate_cycle_delay, validate_speed, ControlCommand, ControlHandle,
    ControlQueue,
};
pub use error::ControlError;
pub use system::SystemClock;
pub use types::{RunState, SimulationStatus, Value};
