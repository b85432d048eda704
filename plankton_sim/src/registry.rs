//! Explicit registry of simulated devices, their setups and adapters.

use crate::simulation::SimulationError;
use plankton_core::{Adapter, AdapterError, ConfigError, Device, Setup};
use std::collections::BTreeMap;
use tracing::debug;

/// Builds a device from a setup.
pub type DeviceFactory = fn(&Setup) -> Result<Box<dyn Device>, ConfigError>;

/// Builds an adapter for an already constructed device.
pub type AdapterFactory = fn(&dyn Device, &[String]) -> Result<Box<dyn Adapter>, AdapterError>;

/// Everything known about one device.
pub struct DeviceEntry {
    factory: DeviceFactory,
    setups: BTreeMap<String, Setup>,
    adapters: Vec<(String, AdapterFactory)>,
}

impl DeviceEntry {
    /// Creates an entry with only the `default` setup and no adapters.
    pub fn new(factory: DeviceFactory) -> Self {
        let mut setups = BTreeMap::new();
        setups.insert("default".to_string(), Setup::default());
        Self {
            factory,
            setups,
            adapters: Vec::new(),
        }
    }

    /// Adds (or replaces) a named setup.
    pub fn with_setup(mut self, name: impl Into<String>, setup: Setup) -> Self {
        self.setups.insert(name.into(), setup);
        self
    }

    /// Adds an adapter for `protocol`. The first adapter added is the default.
    pub fn with_adapter(mut self, protocol: impl Into<String>, factory: AdapterFactory) -> Self {
        let protocol = protocol.into();
        self.adapters.retain(|(p, _)| *p != protocol);
        self.adapters.push((protocol, factory));
        self
    }
}

/// Device name to entry mapping, populated at startup.
#[derive(Default)]
pub struct Registry {
    devices: BTreeMap<String, DeviceEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding all bundled devices.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        crate::devices::register_all(&mut registry);
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, entry: DeviceEntry) {
        let name = name.into();
        debug!(device = %name, "Registered device");
        self.devices.insert(name, entry);
    }

    fn entry(&self, device: &str) -> Result<&DeviceEntry, SimulationError> {
        self.devices
            .get(device)
            .ok_or_else(|| SimulationError::UnknownDevice(device.to_string()))
    }

    /// Device names, sorted.
    pub fn devices(&self) -> impl Iterator<Item = &str> {
        self.devices.keys().map(String::as_str)
    }

    /// Protocols of `device`, default first.
    pub fn protocols(&self, device: &str) -> Result<Vec<&str>, SimulationError> {
        Ok(self
            .entry(device)?
            .adapters
            .iter()
            .map(|(protocol, _)| protocol.as_str())
            .collect())
    }

    /// Setup names of `device`, sorted.
    pub fn setups(&self, device: &str) -> Result<Vec<&str>, SimulationError> {
        Ok(self.entry(device)?.setups.keys().map(String::as_str).collect())
    }

    /// Builds `device` with the named setup (`default` when `None`).
    pub fn create_device(
        &self,
        device: &str,
        setup: Option<&str>,
    ) -> Result<Box<dyn Device>, SimulationError> {
        let entry = self.entry(device)?;
        let setup_name = setup.unwrap_or("default");
        let setup = entry
            .setups
            .get(setup_name)
            .ok_or_else(|| SimulationError::UnknownSetup {
                device: device.to_string(),
                setup: setup_name.to_string(),
            })?;

        debug!(device, setup = setup_name, "Creating device");
        Ok((entry.factory)(setup)?)
    }

    /// Builds the adapter for `protocol` (the device's first when `None`)
    /// around `instance`, passing it the trailing command-line `args`.
    pub fn create_adapter(
        &self,
        device: &str,
        instance: &dyn Device,
        protocol: Option<&str>,
        args: &[String],
    ) -> Result<Box<dyn Adapter>, SimulationError> {
        let entry = self.entry(device)?;
        let no_adapter = || SimulationError::NoAdapter {
            device: device.to_string(),
            protocol: protocol.unwrap_or("<default>").to_string(),
        };

        let (_, factory) = match protocol {
            Some(protocol) => entry.adapters.iter().find(|(p, _)| p == protocol),
            None => entry.adapters.first(),
        }
        .ok_or_else(no_adapter)?;

        Ok(factory(instance, args)?)
    }
}
