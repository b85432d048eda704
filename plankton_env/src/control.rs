//! Control-channel vocabulary and the queue feeding the run loop.

use crate::error::ControlError;
use crate::types::{SimulationStatus, Value};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// A command for a running simulation.
///
/// Commands are queued and applied by the run loop between iterations, in
/// the order they were received. Commands that produce an answer carry a
/// reply slot.
#[derive(Debug)]
pub enum ControlCommand {
    /// Stop advancing the device; the adapter keeps being serviced.
    Pause,

    /// Resume advancing the device after a pause.
    Resume,

    /// Set simulated seconds per wall-clock second.
    SetSpeed(f64),

    /// Set the target wall-clock seconds per cycle.
    SetCycleDelay(f64),

    /// Leave the run loop.
    Stop,

    /// Restore the device context to its defaults.
    Reset,

    /// Report a status snapshot.
    Status(oneshot::Sender<SimulationStatus>),

    /// Read a device context field.
    GetField {
        name: String,
        reply: oneshot::Sender<Result<Value, ControlError>>,
    },

    /// Write a device context field.
    SetField {
        name: String,
        value: Value,
        reply: oneshot::Sender<Result<(), ControlError>>,
    },

    /// List the device context fields.
    Fields(oneshot::Sender<Vec<String>>),
}

impl ControlCommand {
    /// Returns the command name used in logs and on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            ControlCommand::Pause => "pause",
            ControlCommand::Resume => "resume",
            ControlCommand::SetSpeed(_) => "set_speed",
            ControlCommand::SetCycleDelay(_) => "set_cycle_delay",
            ControlCommand::Stop => "stop",
            ControlCommand::Reset => "reset",
            ControlCommand::Status(_) => "status",
            ControlCommand::GetField { .. } => "get_field",
            ControlCommand::SetField { .. } => "set_field",
            ControlCommand::Fields(_) => "fields",
        }
    }
}

/// Checks a speed argument: finite and non-negative. Zero freezes the device.
pub fn validate_speed(speed: f64) -> Result<f64, ControlError> {
    if speed.is_finite() && speed >= 0.0 {
        Ok(speed)
    } else {
        Err(ControlError::invalid(format!(
            "speed must be a finite, non-negative number, got {}",
            speed
        )))
    }
}

/// Converts a cycle-delay argument in seconds, rejecting values that are
/// negative, not finite or too large for a [`Duration`].
pub fn validate_cycle_delay(seconds: f64) -> Result<Duration, ControlError> {
    Duration::try_from_secs_f64(seconds).map_err(|_| {
        ControlError::invalid(format!(
            "cycle delay must be a finite, non-negative number of seconds, got {}",
            seconds
        ))
    })
}

/// Creates a connected handle/queue pair.
///
/// The queue end belongs to the run loop; handles may be cloned freely and
/// moved to other threads.
pub fn control_channel() -> (ControlHandle, ControlQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ControlHandle { tx }, ControlQueue { rx })
}

/// Sending side of the control channel.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: mpsc::UnboundedSender<ControlCommand>,
}

impl ControlHandle {
    /// Queues a raw command.
    pub fn send(&self, command: ControlCommand) -> Result<(), ControlError> {
        self.tx.send(command).map_err(|_| ControlError::ChannelClosed)
    }

    pub fn pause(&self) -> Result<(), ControlError> {
        self.send(ControlCommand::Pause)
    }

    pub fn resume(&self) -> Result<(), ControlError> {
        self.send(ControlCommand::Resume)
    }

    /// Queues a speed change. Invalid speeds are rejected here, before they
    /// reach the run loop.
    pub fn set_speed(&self, speed: f64) -> Result<(), ControlError> {
        let speed = validate_speed(speed)?;
        self.send(ControlCommand::SetSpeed(speed))
    }

    /// Queues a cycle-delay change, in seconds.
    pub fn set_cycle_delay(&self, seconds: f64) -> Result<(), ControlError> {
        validate_cycle_delay(seconds)?;
        self.send(ControlCommand::SetCycleDelay(seconds))
    }

    pub fn stop(&self) -> Result<(), ControlError> {
        self.send(ControlCommand::Stop)
    }

    pub fn reset(&self) -> Result<(), ControlError> {
        self.send(ControlCommand::Reset)
    }

    /// Requests a status snapshot and waits for the next safe point.
    pub async fn status(&self) -> Result<SimulationStatus, ControlError> {
        let (reply, rx) = oneshot::channel();
        self.send(ControlCommand::Status(reply))?;
        rx.await.map_err(|_| ControlError::ChannelClosed)
    }

    /// Reads a device field at the next safe point.
    pub async fn get_field(&self, name: impl Into<String>) -> Result<Value, ControlError> {
        let (reply, rx) = oneshot::channel();
        self.send(ControlCommand::GetField {
            name: name.into(),
            reply,
        })?;
        rx.await.map_err(|_| ControlError::ChannelClosed)?
    }

    /// Writes a device field at the next safe point.
    pub async fn set_field(
        &self,
        name: impl Into<String>,
        value: Value,
    ) -> Result<(), ControlError> {
        let (reply, rx) = oneshot::channel();
        self.send(ControlCommand::SetField {
            name: name.into(),
            value,
            reply,
        })?;
        rx.await.map_err(|_| ControlError::ChannelClosed)?
    }

    /// Lists the device's context fields.
    pub async fn fields(&self) -> Result<Vec<String>, ControlError> {
        let (reply, rx) = oneshot::channel();
        self.send(ControlCommand::Fields(reply))?;
        rx.await.map_err(|_| ControlError::ChannelClosed)
    }

    /// Returns true once the run loop has closed or dropped its queue.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving side of the control channel, owned by the run loop.
#[derive(Debug)]
pub struct ControlQueue {
    rx: mpsc::UnboundedReceiver<ControlCommand>,
}

impl ControlQueue {
    /// Pops the oldest pending command without blocking.
    pub fn try_next(&mut self) -> Option<ControlCommand> {
        self.rx.try_recv().ok()
    }

    /// Pops every pending command, oldest first.
    pub fn drain(&mut self) -> Vec<ControlCommand> {
        let mut commands = Vec::new();
        while let Some(command) = self.try_next() {
            commands.push(command);
        }
        commands
    }

    /// Refuses further commands and drops the pending ones.
    ///
    /// Waiters on dropped reply slots, and later senders, get
    /// [`ControlError::ChannelClosed`].
    pub fn close(&mut self) {
        self.rx.close();
        self.drain();
    }
}
