//! Per-tick processors and their composition.

use crate::error::{ConfigError, DeviceError};
use crate::machine::StateMachine;

/// Anything that does work once per simulation tick.
pub trait Processor<C>: Send {
    /// Advances by `dt` simulated seconds.
    fn advance(&mut self, context: &mut C, dt: f64) -> Result<(), DeviceError>;
}

impl<C> Processor<C> for StateMachine<C> {
    fn advance(&mut self, context: &mut C, dt: f64) -> Result<(), DeviceError> {
        StateMachine::advance(self, context, dt).map_err(DeviceError::from)
    }
}

/// A member of a [`CompositeProcessor`].
pub enum Slot<C> {
    /// The device's state machine
    Machine(StateMachine<C>),

    /// Any other processor
    Custom(Box<dyn Processor<C>>),
}

impl<C> Slot<C> {
    fn advance(&mut self, context: &mut C, dt: f64) -> Result<(), DeviceError> {
        match self {
            Slot::Machine(machine) => Processor::advance(machine, context, dt),
            Slot::Custom(processor) => processor.advance(context, dt),
        }
    }
}

/// Advances a list of processors, in registration order, once per tick.
///
/// At most one state machine may be registered, and only as the first
/// member, so that state evaluation precedes all other per-tick work.
pub struct CompositeProcessor<C> {
    slots: Vec<Slot<C>>,
}

impl<C> CompositeProcessor<C> {
    /// Creates an empty composite.
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Registers the state machine.
    ///
    /// # Errors
    /// [`ConfigError::MachineRegistration`] unless the composite is empty.
    pub fn register_machine(&mut self, machine: StateMachine<C>) -> Result<(), ConfigError> {
        if !self.slots.is_empty() {
            return Err(ConfigError::MachineRegistration);
        }
        self.slots.push(Slot::Machine(machine));
        Ok(())
    }

    /// Appends a processor after all existing members.
    pub fn add<P>(&mut self, processor: P)
    where
        P: Processor<C> + 'static,
    {
        self.add_boxed(Box::new(processor));
    }

    /// Appends an already boxed processor.
    pub fn add_boxed(&mut self, processor: Box<dyn Processor<C>>) {
        self.slots.push(Slot::Custom(processor));
    }

    /// Returns the registered state machine, if any.
    pub fn machine(&self) -> Option<&StateMachine<C>> {
        match self.slots.first() {
            Some(Slot::Machine(machine)) => Some(machine),
            _ => None,
        }
    }

    /// Returns the registered state machine mutably, if any.
    pub fn machine_mut(&mut self) -> Option<&mut StateMachine<C>> {
        match self.slots.first_mut() {
            Some(Slot::Machine(machine)) => Some(machine),
            _ => None,
        }
    }

    /// Number of registered members.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<C> Default for CompositeProcessor<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Processor<C> for CompositeProcessor<C> {
    /// Advances every member in registration order. The first failing member
    /// aborts the tick.
    fn advance(&mut self, context: &mut C, dt: f64) -> Result<(), DeviceError> {
        for slot in &mut self.slots {
            slot.advance(context, dt)?;
        }
        Ok(())
    }
}
