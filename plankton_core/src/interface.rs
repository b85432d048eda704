//! Interfaces: named, externally addressable points bound to a device.
//!
//! Adapters speak in points (`TEMP`, `RATE`, ...), devices speak in context
//! fields. An [`Interface`] is the explicit table between the two. Every
//! binding is checked against the device when the interface is built, so a
//! misspelled field fails at startup rather than on the first request.

use crate::device::Device;
use crate::error::{ConfigError, FieldError};
use plankton_env::Value;
use std::collections::HashSet;
use std::fmt::{self, Write as _};

/// Reads a computed point from the device.
pub type Getter = Box<dyn Fn(&dyn Device) -> Result<Value, FieldError> + Send>;

/// Writes a computed point to the device.
pub type Setter = Box<dyn Fn(&mut dyn Device, Value) -> Result<(), FieldError> + Send>;

/// Getter/setter pair for an interface-local point.
pub struct Accessor {
    get: Getter,
    set: Option<Setter>,
}

impl Accessor {
    pub fn read_only<G>(get: G) -> Self
    where
        G: Fn(&dyn Device) -> Result<Value, FieldError> + Send + 'static,
    {
        Self {
            get: Box::new(get),
            set: None,
        }
    }

    pub fn read_write<G, S>(get: G, set: S) -> Self
    where
        G: Fn(&dyn Device) -> Result<Value, FieldError> + Send + 'static,
        S: Fn(&mut dyn Device, Value) -> Result<(), FieldError> + Send + 'static,
    {
        Self {
            get: Box::new(get),
            set: Some(Box::new(set)),
        }
    }

    pub fn is_writable(&self) -> bool {
        self.set.is_some()
    }
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accessor")
            .field("writable", &self.is_writable())
            .finish()
    }
}

enum Resolved {
    Field { field: String, writable: bool },
    Alias { point: usize, writable: bool },
    Provided(Accessor),
}

/// Collects point declarations for [`Interface::build`].
pub struct InterfaceBuilder {
    protocol: String,
    bindings: Vec<(String, Resolved)>,
}

impl InterfaceBuilder {
    /// Binds `point` to a device field (or an interface-local point) for
    /// reading and writing.
    pub fn bind(mut self, point: impl Into<String>, target: impl Into<String>) -> Self {
        self.bindings.push((
            point.into(),
            Resolved::Field {
                field: target.into(),
                writable: true,
            },
        ));
        self
    }

    /// Binds `point` to a device field (or an interface-local point),
    /// rejecting writes.
    pub fn bind_read_only(mut self, point: impl Into<String>, target: impl Into<String>) -> Self {
        self.bindings.push((
            point.into(),
            Resolved::Field {
                field: target.into(),
                writable: false,
            },
        ));
        self
    }

    /// Declares an interface-local point computed by `accessor`.
    pub fn provide(mut self, point: impl Into<String>, accessor: Accessor) -> Self {
        self.bindings.push((point.into(), Resolved::Provided(accessor)));
        self
    }

    /// Validates every binding against `device` and builds the interface.
    ///
    /// # Errors
    /// - [`ConfigError::DuplicateInterfacePoint`] if a point is declared twice
    /// - [`ConfigError::UnknownInterfaceField`] if a binding names neither a
    ///   device field nor an interface-local point
    pub fn build(mut self, device: &dyn Device) -> Result<Interface, ConfigError> {
        let mut seen = HashSet::new();
        for (point, _) in &self.bindings {
            if !seen.insert(point.as_str()) {
                return Err(ConfigError::DuplicateInterfacePoint(point.clone()));
            }
        }

        let provided_index = |name: &str| {
            self.bindings
                .iter()
                .position(|(p, r)| p == name && matches!(r, Resolved::Provided(_)))
        };

        let mut aliases = Vec::new();
        for (index, (point, resolved)) in self.bindings.iter().enumerate() {
            if let Resolved::Field { field, writable } = resolved {
                if device.fields().contains(&field.as_str()) {
                    continue;
                }
                let target = provided_index(field).ok_or_else(|| ConfigError::UnknownInterfaceField {
                    point: point.clone(),
                    field: field.clone(),
                })?;
                aliases.push((index, target, *writable));
            }
        }

        for (index, target, writable) in aliases {
            self.bindings[index].1 = Resolved::Alias {
                point: target,
                writable,
            };
        }

        Ok(Interface {
            protocol: self.protocol,
            points: self.bindings,
        })
    }
}

/// A validated table of points for one protocol.
pub struct Interface {
    protocol: String,
    points: Vec<(String, Resolved)>,
}

impl Interface {
    pub fn builder(protocol: impl Into<String>) -> InterfaceBuilder {
        InterfaceBuilder {
            protocol: protocol.into(),
            bindings: Vec::new(),
        }
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Point names in declaration order.
    pub fn points(&self) -> impl Iterator<Item = &str> {
        self.points.iter().map(|(point, _)| point.as_str())
    }

    fn lookup(&self, point: &str) -> Result<&Resolved, FieldError> {
        self.points
            .iter()
            .find(|(p, _)| p == point)
            .map(|(_, resolved)| resolved)
            .ok_or_else(|| FieldError::UnknownPoint(point.to_string()))
    }

    /// Reads a point.
    pub fn get(&self, device: &dyn Device, point: &str) -> Result<Value, FieldError> {
        match self.lookup(point)? {
            Resolved::Field { field, .. } => device.read(field),
            Resolved::Alias { point, .. } => match &self.points[*point].1 {
                Resolved::Provided(accessor) => (accessor.get)(device),
                _ => Err(FieldError::UnknownPoint(self.points[*point].0.clone())),
            },
            Resolved::Provided(accessor) => (accessor.get)(device),
        }
    }

    /// Writes a point.
    pub fn set(&self, device: &mut dyn Device, point: &str, value: Value) -> Result<(), FieldError> {
        let read_only = || FieldError::ReadOnly(point.to_string());

        match self.lookup(point)? {
            Resolved::Field { field, writable } => {
                if !writable {
                    return Err(read_only());
                }
                device.write(field, value)
            }
            Resolved::Alias { point: index, writable } => {
                if !writable {
                    return Err(read_only());
                }
                match &self.points[*index].1 {
                    Resolved::Provided(Accessor { set: Some(set), .. }) => set(device, value),
                    _ => Err(read_only()),
                }
            }
            Resolved::Provided(accessor) => match &accessor.set {
                Some(set) => set(device, value),
                None => Err(read_only()),
            },
        }
    }

    /// Human-readable list of points, one per line.
    pub fn documentation(&self) -> String {
        let mut out = format!("Protocol: {}\n", self.protocol);
        for (point, resolved) in &self.points {
            let (target, writable) = match resolved {
                Resolved::Field { field, writable } => (field.clone(), *writable),
                Resolved::Alias { point, writable } => {
                    let provided = &self.points[*point];
                    let writable = *writable
                        && matches!(&provided.1, Resolved::Provided(a) if a.is_writable());
                    (provided.0.clone(), writable)
                }
                Resolved::Provided(accessor) => ("(computed)".to_string(), accessor.is_writable()),
            };
            let access = if writable { "read/write" } else { "read-only" };
            let _ = writeln!(out, "    {:<12} {:<24} {}", point, target, access);
        }
        out
    }
}

impl fmt::Debug for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interface")
            .field("protocol", &self.protocol)
            .field("points", &self.points().collect::<Vec<_>>())
            .finish()
    }
}
