//! plankton Core - cycle-driven device state-machine engine
//!
//! A simulated device is a typed [`Context`] plus a [`StateMachine`] over it,
//! advanced once per cycle through a [`CompositeProcessor`]. Adapters reach
//! the device only through the object-safe [`Device`] trait and an
//! [`Interface`] of named points.

pub mod adapter;
pub mod context;
pub mod device;
pub mod error;
pub mod interface;
pub mod machine;
pub mod processor;
pub mod state;

// Re-export key types for convenience
pub use adapter::{Adapter, NullAdapter};
pub use context::{Context, FieldValue};
pub use device::{Device, DeviceModel, Overrides, Setup, StateMachineDevice};
pub use error::{AdapterError, BehaviorError, ConfigError, DeviceError, ErrorKind, FieldError};
pub use interface::{Accessor, Interface, InterfaceBuilder};
pub use machine::{StateMachine, StateTable};
pub use processor::{CompositeProcessor, Processor, Slot};
pub use state::{EmptyState, FnState, Guard, HookResult, State, Transition};

pub use plankton_env::Value;
