//! Common types shared between the engine, the scheduler and remote clients.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A scalar value of a device context field.
///
/// This is the currency of every name-addressed access to a device: setup
/// overrides, interface points and remote `get_field`/`set_field` requests.
/// Typed device code never sees it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl Value {
    /// Returns the name of the variant, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
        }
    }

    /// Returns the value as `f64`, widening integers.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float(v) => Some(v),
            Value::Int(v) => Some(v as f64),
            Value::Bool(_) => None,
        }
    }

    /// Returns the value as `i64` if it is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the value as `bool` if it is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

/// Lifecycle of a simulation run loop.
///
/// `Idle -> Running <-> Paused -> Stopped`. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Constructed, `start()` not yet called
    Idle,

    /// Loop active, device advancing
    Running,

    /// Loop active, device frozen, adapter still serviced
    Paused,

    /// Loop exited
    Stopped,
}

impl RunState {
    /// Returns true while the run loop is iterating.
    pub fn is_active(&self) -> bool {
        matches!(self, RunState::Running | RunState::Paused)
    }
}

/// Snapshot of a simulation, as reported to remote clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationStatus {
    /// Current run state
    pub state: RunState,

    /// Number of cycles in which the device was advanced
    pub cycles: u64,

    /// Accumulated simulated time in seconds
    pub runtime: f64,

    /// Wall-clock seconds since `start()`
    pub uptime: f64,

    /// Simulated seconds per wall-clock second
    pub speed: f64,

    /// Target wall-clock seconds per cycle
    pub cycle_delay: f64,

    /// Name of the device's current state-machine state
    pub device_state: String,

    /// Address the control server is bound to while the loop runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_address: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_widening() {
        assert_eq!(Value::Int(3).as_f64(), Some(3.0));
        assert_eq!(Value::Float(2.5).as_f64(), Some(2.5));
        assert_eq!(Value::Bool(true).as_f64(), None);
        assert_eq!(Value::Float(2.0).as_i64(), None);
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Bool(false).to_string(), "false");
        assert_eq!(Value::Int(-4).to_string(), "-4");
        assert_eq!(Value::Float(29.5).to_string(), "29.5");
    }

    #[test]
    fn test_run_state_activity() {
        assert!(!RunState::Idle.is_active());
        assert!(RunState::Running.is_active());
        assert!(RunState::Paused.is_active());
        assert!(!RunState::Stopped.is_active());
    }
}
