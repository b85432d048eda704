//! Error types for the control channel.

use thiserror::Error;

/// Errors that can occur while talking to a running simulation.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The run loop has exited and dropped its end of the queue
    #[error("Control channel closed")]
    ChannelClosed,

    /// A command argument is out of range (negative speed, NaN delay, ...)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The simulation refused the command (unknown field, type mismatch, ...)
    #[error("Command rejected: {0}")]
    Rejected(String),

    /// A request could not be decoded
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// Socket-level failure of a remote control connection
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ControlError {
    /// Creates an invalid-argument error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Creates a rejection error.
    pub fn rejected(msg: impl std::fmt::Display) -> Self {
        Self::Rejected(msg.to_string())
    }
}
