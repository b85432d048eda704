//! Error taxonomy of the device engine.
//!
//! Failures fall into three categories that callers must be able to tell
//! apart (see [`ErrorKind`]):
//!
//! - **Configuration**: detected while building a device, state machine or
//!   interface. Nothing is constructed.
//! - **Invariant**: a name-addressed access to a context field that does not
//!   exist, or with a value of the wrong type.
//! - **Behavior**: a state hook reported a fault. The device must not be
//!   advanced again.
//!
//! Adapter failures are a fourth, separate type ([`AdapterError`]).

use plankton_env::Value;
use thiserror::Error;

/// Construction-time failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Initial state '{0}' is not part of the state table")]
    UnknownInitialState(String),

    #[error("State '{0}' is declared more than once")]
    DuplicateState(String),

    #[error("Transition ({from}, {to}) is declared more than once")]
    DuplicateTransition { from: String, to: String },

    #[error("Transition ({from}, {to}) refers to undeclared state '{state}'")]
    TransitionToUnknownState {
        from: String,
        to: String,
        state: String,
    },

    #[error("Override refers to states that do not exist: {0:?}")]
    UnknownStateOverride(Vec<String>),

    #[error("Override refers to transitions that do not exist: {0:?}")]
    UnknownTransitionOverride(Vec<(String, String)>),

    #[error("Override refers to data fields that do not exist: {0:?}")]
    UnknownDataOverride(Vec<String>),

    #[error("Override value for '{field}' is invalid: {reason}")]
    InvalidDataOverride { field: String, reason: String },

    #[error("Interface point '{point}' is bound to '{field}', which is neither a device field nor an interface point")]
    UnknownInterfaceField { point: String, field: String },

    #[error("Interface point '{0}' is declared more than once")]
    DuplicateInterfacePoint(String),

    #[error("The state machine must be the first and only machine registered with a composite processor")]
    MachineRegistration,
}

/// Invariant violations on name-addressed field access.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    #[error("'{context}' has no field named '{field}'")]
    UnknownField { context: &'static str, field: String },

    #[error("Field '{field}' expects a {expected} value, got {found}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: Value,
    },

    #[error("Interface has no point named '{0}'")]
    UnknownPoint(String),

    #[error("Interface point '{0}' is read-only")]
    ReadOnly(String),
}

impl FieldError {
    /// Creates an unknown-field error.
    pub fn unknown(context: &'static str, field: impl Into<String>) -> Self {
        Self::UnknownField {
            context,
            field: field.into(),
        }
    }

    /// Creates a type-mismatch error.
    pub fn type_mismatch(field: impl Into<String>, expected: &'static str, found: Value) -> Self {
        Self::TypeMismatch {
            field: field.into(),
            expected,
            found,
        }
    }
}

/// A fault raised from inside a state hook.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("State '{state}' faulted: {message}")]
pub struct BehaviorError {
    /// State whose hook raised the fault
    pub state: String,

    /// Human readable description
    pub message: String,
}

impl BehaviorError {
    /// Creates a fault for the given state.
    ///
    /// The state machine fills in `state` when a hook returns an error with an
    /// empty state name, so hooks may simply write `BehaviorError::new("", ..)`
    /// or use [`BehaviorError::msg`].
    pub fn new(state: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            message: message.into(),
        }
    }

    /// Creates a fault without a state name.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new("", message)
    }
}

/// Category of a [`DeviceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Invariant,
    Behavior,
}

/// Any failure surfaced by a device.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeviceError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invariant violation: {0}")]
    Field(#[from] FieldError),

    #[error("Behavior error: {0}")]
    Behavior(#[from] BehaviorError),
}

impl DeviceError {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeviceError::Config(_) => ErrorKind::Configuration,
            DeviceError::Field(_) => ErrorKind::Invariant,
            DeviceError::Behavior(_) => ErrorKind::Behavior,
        }
    }
}

/// An adapter that cannot continue servicing its protocol.
///
/// Per-request problems (malformed input, a client hanging up) are handled
/// inside the adapter and never become an `AdapterError`.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Adapter failed to start: {0}")]
    Startup(String),

    #[error("Adapter I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Adapter configuration error: {0}")]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_are_distinguishable() {
        let config: DeviceError = ConfigError::UnknownInitialState("x".into()).into();
        let field: DeviceError = FieldError::unknown("Data", "nope").into();
        let behavior: DeviceError = BehaviorError::new("heat", "boom").into();

        assert_eq!(config.kind(), ErrorKind::Configuration);
        assert_eq!(field.kind(), ErrorKind::Invariant);
        assert_eq!(behavior.kind(), ErrorKind::Behavior);
    }

    #[test]
    fn test_messages_name_the_culprit() {
        let err = FieldError::unknown("LinkamData", "temprature");
        assert!(err.to_string().contains("temprature"));

        let err = ConfigError::UnknownStateOverride(vec!["hoald".into()]);
        assert!(err.to_string().contains("hoald"));
    }
}
