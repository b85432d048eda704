//! Adapters bundled with the simulator.

use clap::Parser;
use plankton_core::{Adapter, AdapterError, Device, Interface};
use plankton_env::{Clock, SystemClock};
use std::fmt::Write as _;
use std::time::Duration;
use tracing::{info, warn};

/// Command-line options of the monitor adapter.
#[derive(Parser, Debug)]
#[command(name = "monitor", no_binary_name = true)]
struct MonitorArgs {
    /// Seconds between two reports
    #[arg(short = 'i', long, default_value = "1.0")]
    report_interval: f64,
}

/// Periodically logs every point of an interface.
///
/// Useful to watch a device without any protocol client attached.
pub struct MonitorAdapter<K: Clock = SystemClock> {
    interface: Interface,
    report_interval: Duration,
    clock: K,
    last_report: Option<Duration>,
    started: bool,
}

impl MonitorAdapter<SystemClock> {
    pub fn new(interface: Interface, report_interval: Duration) -> Self {
        Self::with_clock(interface, report_interval, SystemClock::new())
    }

    /// Builds the adapter from trailing command-line arguments.
    pub fn from_args(interface: Interface, args: &[String]) -> Result<Self, AdapterError> {
        let parsed =
            MonitorArgs::try_parse_from(args).map_err(|e| AdapterError::Startup(e.to_string()))?;
        let interval = Duration::try_from_secs_f64(parsed.report_interval).map_err(|e| {
            AdapterError::Startup(format!(
                "invalid report interval {}: {}",
                parsed.report_interval, e
            ))
        })?;
        Ok(Self::new(interface, interval))
    }
}

impl<K: Clock> MonitorAdapter<K> {
    pub fn with_clock(interface: Interface, report_interval: Duration, clock: K) -> Self {
        Self {
            interface,
            report_interval,
            clock,
            last_report: None,
            started: false,
        }
    }

    pub fn report_interval(&self) -> Duration {
        self.report_interval
    }

    /// Renders `POINT=value` pairs for every point.
    pub fn report(&self, device: &dyn Device) -> String {
        let mut line = String::new();
        for point in self.interface.points() {
            if !line.is_empty() {
                line.push(' ');
            }
            match self.interface.get(device, point) {
                Ok(value) => {
                    let _ = write!(line, "{}={}", point, value);
                }
                Err(e) => {
                    warn!(point, error = %e, "Point not readable");
                    let _ = write!(line, "{}=?", point);
                }
            }
        }
        line
    }
}

impl<K: Clock> Adapter for MonitorAdapter<K> {
    fn protocol(&self) -> &str {
        self.interface.protocol()
    }

    fn documentation(&self) -> String {
        self.interface.documentation()
    }

    fn start_server(&mut self) -> Result<(), AdapterError> {
        if !self.started {
            self.started = true;
            info!(
                interval = self.report_interval.as_secs_f64(),
                "Monitor reporting"
            );
        }
        Ok(())
    }

    fn handle(&mut self, device: &mut dyn Device, budget: Duration) -> Result<(), AdapterError> {
        let begin = self.clock.now();

        let due = self
            .last_report
            .map_or(true, |last| begin.saturating_sub(last) >= self.report_interval);
        if due {
            info!(state = %device.current_state(), "{}", self.report(device));
            self.last_report = Some(begin);
        }

        let spent = self.clock.now().saturating_sub(begin);
        if let Some(remaining) = budget.checked_sub(spent) {
            self.clock.sleep(remaining);
        }
        Ok(())
    }
}
