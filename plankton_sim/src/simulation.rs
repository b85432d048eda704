//! The simulation scheduler: paces a device against a clock, services its
//! adapter and applies remote control commands between cycles.

use crate::control_server::ControlServer;
use plankton_core::{Adapter, AdapterError, ConfigError, Device, DeviceError};
use plankton_env::{
    control_channel, validate_cycle_delay, validate_speed, Clock, ControlCommand, ControlError,
    ControlHandle, ControlQueue, RunState, SimulationStatus, SystemClock,
};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Errors that end (or prevent) a simulation run.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Simulation has already been started")]
    AlreadyStarted,

    #[error("Invalid simulation parameter: {0}")]
    InvalidArgument(#[from] ControlError),

    #[error("Device fault: {0}")]
    Device(#[from] DeviceError),

    #[error("Adapter failure: {0}")]
    Adapter(#[from] AdapterError),

    #[error("Control server failed: {0}")]
    ControlServer(String),

    #[error("Unknown device '{0}'")]
    UnknownDevice(String),

    #[error("Device '{device}' has no setup named '{setup}'")]
    UnknownSetup { device: String, setup: String },

    #[error("Device '{device}' has no adapter for protocol '{protocol}'")]
    NoAdapter { device: String, protocol: String },
}

impl From<ConfigError> for SimulationError {
    fn from(e: ConfigError) -> Self {
        SimulationError::Device(e.into())
    }
}

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Target wall-clock time per cycle
    pub cycle_delay: Duration,

    /// Simulated seconds per wall-clock second
    pub speed: f64,

    /// `HOST:PORT` of the remote control server, if any
    pub control_address: Option<String>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            cycle_delay: Duration::from_millis(100),
            speed: 1.0,
            control_address: None,
        }
    }
}

impl SimulationConfig {
    /// Sets the cycle delay.
    pub fn with_cycle_delay(mut self, cycle_delay: Duration) -> Self {
        self.cycle_delay = cycle_delay;
        self
    }

    /// Sets the speed multiplier.
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    /// Enables the remote control server on `address`.
    pub fn with_control_address(mut self, address: impl Into<String>) -> Self {
        self.control_address = Some(address.into());
        self
    }
}

/// A device, its adapter and the loop that drives them.
pub struct Simulation<K: Clock = SystemClock> {
    device: Box<dyn Device>,
    adapter: Box<dyn Adapter>,
    clock: K,

    cycle_delay: Duration,
    speed: f64,
    state: RunState,

    /// Number of cycles in which the device was advanced
    cycles: u64,

    /// Accumulated simulated seconds
    runtime: f64,

    /// Clock reading at `start()`
    started_at: Option<Duration>,

    control_address: Option<String>,

    /// Bound address of the control server while the loop runs
    control_addr: Option<SocketAddr>,

    handle: ControlHandle,
    queue: ControlQueue,
}

impl Simulation<SystemClock> {
    /// Creates a wall-clock simulation.
    pub fn new(
        device: Box<dyn Device>,
        adapter: Box<dyn Adapter>,
        config: SimulationConfig,
    ) -> Result<Self, SimulationError> {
        Self::with_clock(device, adapter, config, SystemClock::new())
    }
}

impl<K: Clock> Simulation<K> {
    /// Creates a simulation paced by `clock`.
    pub fn with_clock(
        device: Box<dyn Device>,
        adapter: Box<dyn Adapter>,
        config: SimulationConfig,
        clock: K,
    ) -> Result<Self, SimulationError> {
        let speed = validate_speed(config.speed)?;
        let (handle, queue) = control_channel();

        Ok(Self {
            device,
            adapter,
            clock,
            cycle_delay: config.cycle_delay,
            speed,
            state: RunState::Idle,
            cycles: 0,
            runtime: 0.0,
            started_at: None,
            control_address: config.control_address,
            control_addr: None,
            handle,
            queue,
        })
    }

    /// Returns a handle for sending commands to the run loop.
    pub fn handle(&self) -> ControlHandle {
        self.handle.clone()
    }

    /// Asks the run loop to stop after the current cycle.
    pub fn stop(&self) -> Result<(), SimulationError> {
        Ok(self.handle.stop()?)
    }

    /// Starts the adapter (and control server, if configured) and runs the
    /// loop until it is stopped or faults.
    ///
    /// When the loop exits the control queue is closed: pending requests and
    /// later sends fail with [`ControlError::ChannelClosed`].
    ///
    /// # Errors
    /// - [`SimulationError::AlreadyStarted`] if called more than once
    /// - [`SimulationError::Device`] if the device faulted
    /// - [`SimulationError::Adapter`] if the adapter could not continue
    /// - [`SimulationError::ControlServer`] if the control server did not start
    pub fn start(&mut self) -> Result<(), SimulationError> {
        if self.state != RunState::Idle {
            return Err(SimulationError::AlreadyStarted);
        }

        let control_server = match &self.control_address {
            Some(address) => Some(ControlServer::start(address, self.handle.clone())?),
            None => None,
        };

        self.adapter.start_server()?;
        self.control_addr = control_server.as_ref().map(ControlServer::local_addr);

        self.state = RunState::Running;
        self.started_at = Some(self.clock.now());
        info!(
            device_state = %self.device.current_state(),
            protocol = %self.adapter.protocol(),
            cycle_delay = self.cycle_delay.as_secs_f64(),
            speed = self.speed,
            "Simulation started"
        );

        let result = self.run();
        self.state = RunState::Stopped;
        self.queue.close();

        if let Some(server) = control_server {
            server.shutdown();
        }
        self.control_addr = None;

        match &result {
            Ok(()) => info!(
                cycles = self.cycles,
                runtime = self.runtime,
                "Simulation stopped"
            ),
            Err(e) => error!(error = %e, cycles = self.cycles, "Simulation terminated"),
        }
        result
    }

    fn run(&mut self) -> Result<(), SimulationError> {
        let mut last_cycle: Option<Duration> = None;

        while self.state.is_active() {
            let cycle_start = self.clock.now();
            let elapsed = last_cycle.map_or(Duration::ZERO, |prev| cycle_start.saturating_sub(prev));
            last_cycle = Some(cycle_start);

            if self.state == RunState::Running {
                self.process(elapsed)?;
            }

            self.adapter
                .handle(self.device.as_mut(), self.cycle_delay)?;

            self.process_commands();

            if !self.state.is_active() {
                break;
            }

            let spent = self.clock.now().saturating_sub(cycle_start);
            if let Some(remaining) = self.cycle_delay.checked_sub(spent) {
                self.clock.sleep(remaining);
            }
        }

        Ok(())
    }

    /// Advances the device by the simulated equivalent of `elapsed`.
    fn process(&mut self, elapsed: Duration) -> Result<(), SimulationError> {
        let dt = elapsed.as_secs_f64() * self.speed;

        self.device.advance(dt)?;

        self.cycles += 1;
        self.runtime += dt;
        Ok(())
    }

    /// Applies every queued command, in receipt order.
    fn process_commands(&mut self) {
        while let Some(command) = self.queue.try_next() {
            debug!(command = command.name(), "Applying control command");
            self.apply(command);
        }
    }

    fn apply(&mut self, command: ControlCommand) {
        match command {
            ControlCommand::Pause => {
                if self.state == RunState::Running {
                    self.state = RunState::Paused;
                    info!("Simulation paused");
                }
            }
            ControlCommand::Resume => {
                if self.state == RunState::Paused {
                    self.state = RunState::Running;
                    info!("Simulation resumed");
                }
            }
            ControlCommand::SetSpeed(speed) => match validate_speed(speed) {
                Ok(speed) => {
                    self.speed = speed;
                    info!(speed, "Speed changed");
                }
                Err(e) => warn!(error = %e, "Ignoring speed change"),
            },
            ControlCommand::SetCycleDelay(seconds) => match validate_cycle_delay(seconds) {
                Ok(delay) => {
                    self.cycle_delay = delay;
                    info!(cycle_delay = seconds, "Cycle delay changed");
                }
                Err(e) => warn!(error = %e, "Ignoring cycle delay change"),
            },
            ControlCommand::Stop => {
                if self.state.is_active() {
                    self.state = RunState::Stopped;
                    info!("Stop requested");
                }
            }
            ControlCommand::Reset => {
                self.device.initialize_data();
                info!("Device data reset");
            }
            ControlCommand::Status(reply) => {
                let _ = reply.send(self.status());
            }
            ControlCommand::GetField { name, reply } => {
                let _ = reply.send(self.device.read(&name).map_err(ControlError::rejected));
            }
            ControlCommand::SetField { name, value, reply } => {
                let result = self.device.write(&name, value).map_err(ControlError::rejected);
                if let Err(e) = &result {
                    warn!(field = %name, error = %e, "Rejected field write");
                }
                let _ = reply.send(result);
            }
            ControlCommand::Fields(reply) => {
                let fields = self.device.fields().iter().map(|f| f.to_string()).collect();
                let _ = reply.send(fields);
            }
        }
    }

    /// Returns a snapshot of the run.
    pub fn status(&self) -> SimulationStatus {
        let uptime = self
            .started_at
            .map_or(Duration::ZERO, |start| self.clock.now().saturating_sub(start));

        SimulationStatus {
            state: self.state,
            cycles: self.cycles,
            runtime: self.runtime,
            uptime: uptime.as_secs_f64(),
            speed: self.speed,
            cycle_delay: self.cycle_delay.as_secs_f64(),
            device_state: self.device.current_state().to_string(),
            control_address: self.control_addr.map(|addr| addr.to_string()),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn runtime(&self) -> f64 {
        self.runtime
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn cycle_delay(&self) -> Duration {
        self.cycle_delay
    }

    /// Address of the control server, while the loop runs.
    pub fn control_addr(&self) -> Option<SocketAddr> {
        self.control_addr
    }

    pub fn device(&self) -> &dyn Device {
        self.device.as_ref()
    }

    pub fn adapter(&self) -> &dyn Adapter {
        self.adapter.as_ref()
    }
}
