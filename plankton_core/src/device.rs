//! Devices: a context, a state machine and a composite processor, glued
//! together behind one per-cycle entry point.
//!
//! A concrete device describes itself through [`DeviceModel`]; a setup or a
//! test can then replace parts of that description with [`Overrides`]. The
//! override contract is strict: every name in an override must already exist
//! in the model, and one bad name rejects the whole device.

use crate::context::Context;
use crate::error::{ConfigError, DeviceError, FieldError};
use crate::machine::{StateMachine, StateTable};
use crate::processor::{CompositeProcessor, Processor};
use crate::state::{Guard, State, Transition};
use plankton_env::Value;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Object-safe view of a device, as seen by the scheduler and by adapters.
pub trait Device: Send {
    /// Advances the device by `dt` simulated seconds. Called once per cycle.
    fn advance(&mut self, dt: f64) -> Result<(), DeviceError>;

    /// Restores the context to the device's default data.
    fn initialize_data(&mut self);

    /// Name of the current state-machine state.
    fn current_state(&self) -> &str;

    /// Names of all context fields.
    fn fields(&self) -> &'static [&'static str];

    /// Reads a context field by name.
    fn read(&self, field: &str) -> Result<Value, FieldError>;

    /// Writes a context field by name.
    fn write(&mut self, field: &str, value: Value) -> Result<(), FieldError>;
}

/// The default description of a state-machine driven device.
pub trait DeviceModel {
    /// The device's data record.
    type Context: Context;

    /// Default state table.
    fn states(&self) -> StateTable<Self::Context>;

    /// Default transitions. Order matters: the first matching guard wins.
    fn transitions(&self) -> Vec<Transition<Self::Context>>;

    /// Name of the state the machine starts in.
    fn initial_state(&self) -> &str;

    /// Extra processors, advanced after the state machine every cycle.
    fn processors(&self) -> Vec<Box<dyn Processor<Self::Context>>> {
        Vec::new()
    }
}

/// Type-independent part of an override: initial state and data values.
///
/// This is what named setups are made of.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Setup {
    /// Replacement initial state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_state: Option<String>,

    /// Replacement initial values of context fields
    #[serde(default)]
    pub data: BTreeMap<String, Value>,
}

impl Setup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initial_state(mut self, state: impl Into<String>) -> Self {
        self.initial_state = Some(state.into());
        self
    }

    pub fn data(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(field.into(), value.into());
        self
    }
}

/// Replacements applied on top of a device's defaults at construction.
pub struct Overrides<C> {
    /// Replacement initial state
    pub initial_state: Option<String>,

    /// Replacement states, by name
    pub states: Vec<(String, Box<dyn State<C>>)>,

    /// Replacement guards, by `(from, to)`
    pub transitions: Vec<((String, String), Guard<C>)>,

    /// Replacement initial values of context fields
    pub data: BTreeMap<String, Value>,
}

impl<C> Overrides<C> {
    pub fn new() -> Self {
        Self {
            initial_state: None,
            states: Vec::new(),
            transitions: Vec::new(),
            data: BTreeMap::new(),
        }
    }

    pub fn initial_state(mut self, state: impl Into<String>) -> Self {
        self.initial_state = Some(state.into());
        self
    }

    pub fn state<S>(mut self, name: impl Into<String>, state: S) -> Self
    where
        S: State<C> + 'static,
    {
        self.states.push((name.into(), Box::new(state)));
        self
    }

    pub fn transition<F>(mut self, from: impl Into<String>, to: impl Into<String>, guard: F) -> Self
    where
        F: Fn(&C) -> bool + Send + 'static,
    {
        self.transitions
            .push(((from.into(), to.into()), Box::new(guard)));
        self
    }

    pub fn data(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(field.into(), value.into());
        self
    }

    /// Returns true if nothing is overridden.
    pub fn is_empty(&self) -> bool {
        self.initial_state.is_none()
            && self.states.is_empty()
            && self.transitions.is_empty()
            && self.data.is_empty()
    }
}

impl<C> Default for Overrides<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> From<Setup> for Overrides<C> {
    fn from(setup: Setup) -> Self {
        Self {
            initial_state: setup.initial_state,
            data: setup.data,
            ..Self::new()
        }
    }
}

/// A device whose behavior is a state machine over a context `C`.
pub struct StateMachineDevice<C: Context> {
    /// Current device data
    context: C,

    /// Default data (initializer output plus data overrides)
    defaults: C,

    /// Per-cycle work; the state machine is always the first member
    processors: CompositeProcessor<C>,
}

impl<C: Context> StateMachineDevice<C> {
    /// Builds a device from explicit tables.
    ///
    /// All override keys are validated before anything is applied; a single
    /// unknown key fails the whole construction.
    pub fn build(
        mut states: StateTable<C>,
        mut transitions: Vec<Transition<C>>,
        initial_state: &str,
        overrides: Overrides<C>,
    ) -> Result<Self, ConfigError> {
        let Overrides {
            initial_state: initial_override,
            states: state_overrides,
            transitions: transition_overrides,
            data,
        } = overrides;

        let known_states: HashSet<&str> = states.iter().map(|(name, _)| name.as_str()).collect();
        let unknown: Vec<String> = state_overrides
            .iter()
            .filter(|(name, _)| !known_states.contains(name.as_str()))
            .map(|(name, _)| name.clone())
            .collect();
        if !unknown.is_empty() {
            return Err(ConfigError::UnknownStateOverride(unknown));
        }

        let known_pairs: HashSet<(&str, &str)> = transitions.iter().map(|t| t.key()).collect();
        let unknown: Vec<(String, String)> = transition_overrides
            .iter()
            .filter(|((from, to), _)| !known_pairs.contains(&(from.as_str(), to.as_str())))
            .map(|(pair, _)| pair.clone())
            .collect();
        if !unknown.is_empty() {
            return Err(ConfigError::UnknownTransitionOverride(unknown));
        }

        let unknown: Vec<String> = data
            .keys()
            .filter(|field| !C::has_field(field))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(ConfigError::UnknownDataOverride(unknown));
        }

        let mut defaults = C::default();
        for (field, value) in &data {
            defaults
                .set(field, *value)
                .map_err(|e| ConfigError::InvalidDataOverride {
                    field: field.clone(),
                    reason: e.to_string(),
                })?;
        }

        for (name, replacement) in state_overrides {
            if let Some(slot) = states.iter_mut().find(|(n, _)| *n == name) {
                slot.1 = replacement;
            }
        }

        for ((from, to), guard) in transition_overrides {
            if let Some(transition) = transitions
                .iter_mut()
                .find(|t| t.from == from && t.to == to)
            {
                transition.guard = guard;
            }
        }

        let initial = initial_override.as_deref().unwrap_or(initial_state);
        let machine = StateMachine::new(states, transitions, initial)?;

        let mut processors = CompositeProcessor::new();
        processors.register_machine(machine)?;

        Ok(Self {
            context: defaults.clone(),
            defaults,
            processors,
        })
    }

    /// Builds a device from its model, applying `overrides`.
    pub fn from_model<M>(model: &M, overrides: Overrides<C>) -> Result<Self, ConfigError>
    where
        M: DeviceModel<Context = C>,
    {
        let mut device = Self::build(
            model.states(),
            model.transitions(),
            model.initial_state(),
            overrides,
        )?;
        for processor in model.processors() {
            device.processors.add_boxed(processor);
        }
        Ok(device)
    }

    /// Appends a processor that runs after the state machine every cycle.
    pub fn add_processor<P>(&mut self, processor: P)
    where
        P: Processor<C> + 'static,
    {
        self.processors.add(processor);
    }

    /// Returns the device data.
    pub fn context(&self) -> &C {
        &self.context
    }

    /// Returns the device data mutably, for adapters and tests.
    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    /// Returns the state machine.
    pub fn machine(&self) -> Option<&StateMachine<C>> {
        self.processors.machine()
    }
}

impl<C: Context> Device for StateMachineDevice<C> {
    fn advance(&mut self, dt: f64) -> Result<(), DeviceError> {
        self.processors.advance(&mut self.context, dt)
    }

    fn initialize_data(&mut self) {
        self.context = self.defaults.clone();
    }

    fn current_state(&self) -> &str {
        self.processors
            .machine()
            .map_or("", |machine| machine.current_state())
    }

    fn fields(&self) -> &'static [&'static str] {
        C::FIELDS
    }

    fn read(&self, field: &str) -> Result<Value, FieldError> {
        self.context.get(field)
    }

    fn write(&mut self, field: &str, value: Value) -> Result<(), FieldError> {
        self.context.set(field, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BehaviorError;
    use crate::state::{EmptyState, FnState};
    use approx::assert_relative_eq;

    crate::device_context! {
        struct Oven {
            temperature: f64 = 24.0,
            temperature_limit: f64 = 30.0,
            temperature_rate: f64 = 5.0,
            ticks: i64 = 0,
        }
    }

    struct OvenModel;

    impl DeviceModel for OvenModel {
        type Context = Oven;

        fn states(&self) -> StateTable<Oven> {
            vec![
                ("init".to_string(), Box::new(EmptyState)),
                ("started".to_string(), Box::new(EmptyState)),
                (
                    "heat".to_string(),
                    Box::new(FnState::new().with_tick(|o: &mut Oven, dt| {
                        o.temperature = (o.temperature + o.temperature_rate * dt / 60.0)
                            .min(o.temperature_limit);
                        Ok(())
                    })),
                ),
                ("hold".to_string(), Box::new(EmptyState)),
            ]
        }

        fn transitions(&self) -> Vec<Transition<Oven>> {
            vec![
                Transition::new("init", "started", |_: &Oven| true),
                Transition::new("started", "heat", |o: &Oven| o.temperature < o.temperature_limit),
                Transition::new("heat", "hold", |o: &Oven| o.temperature == o.temperature_limit),
            ]
        }

        fn initial_state(&self) -> &str {
            "init"
        }
    }

    struct TickCounter;

    impl Processor<Oven> for TickCounter {
        fn advance(&mut self, oven: &mut Oven, _: f64) -> Result<(), DeviceError> {
            oven.ticks += 1;
            Ok(())
        }
    }

    fn oven(overrides: Overrides<Oven>) -> Result<StateMachineDevice<Oven>, ConfigError> {
        StateMachineDevice::from_model(&OvenModel, overrides)
    }

    #[test]
    fn test_build_with_defaults() {
        let device = oven(Overrides::new()).unwrap();
        assert_eq!(device.current_state(), "init");
        assert_eq!(device.context(), &Oven::default());
        assert_eq!(device.fields().len(), 4);
    }

    #[test]
    fn test_initial_state_override() {
        assert!(oven(Overrides::new().initial_state("init")).is_ok());
        let device = oven(Overrides::new().initial_state("heat")).unwrap();
        assert_eq!(device.current_state(), "heat");

        let result = oven(Overrides::new().initial_state("invalid"));
        assert!(matches!(result, Err(ConfigError::UnknownInitialState(_))));
    }

    #[test]
    fn test_data_override() {
        let device = oven(Overrides::new().data("temperature", 2.0)).unwrap();
        assert_eq!(device.context().temperature, 2.0);

        let result = oven(Overrides::new().data("nonexisting_member", 1.0));
        assert!(matches!(result, Err(ConfigError::UnknownDataOverride(ref f)) if f == &["nonexisting_member"]));

        let result = oven(Overrides::new().data("ticks", 1.5));
        assert!(matches!(result, Err(ConfigError::InvalidDataOverride { .. })));
    }

    #[test]
    fn test_one_unknown_key_rejects_everything() {
        let result = oven(
            Overrides::new()
                .data("temperature", 50.0)
                .data("temprature", 50.0)
                .state("heat", EmptyState),
        );
        assert!(matches!(result, Err(ConfigError::UnknownDataOverride(_))));

        let result = oven(
            Overrides::new()
                .state("heat", EmptyState)
                .state("hoald", EmptyState),
        );
        assert!(matches!(result, Err(ConfigError::UnknownStateOverride(ref s)) if s == &["hoald"]));

        let result = oven(
            Overrides::new()
                .transition("init", "started", |_: &Oven| false)
                .transition("init", "heat", |_: &Oven| true),
        );
        assert!(matches!(
            result,
            Err(ConfigError::UnknownTransitionOverride(ref pairs))
                if pairs == &[("init".to_string(), "heat".to_string())]
        ));
    }

    #[test]
    fn test_state_override_replaces_behavior() {
        let frozen_heat = FnState::new().with_tick(|_: &mut Oven, _| Ok(()));
        let mut device = oven(
            Overrides::new()
                .initial_state("heat")
                .state("heat", frozen_heat),
        )
        .unwrap();

        device.advance(60.0).unwrap();
        assert_eq!(device.context().temperature, 24.0);
    }

    #[test]
    fn test_transition_override_replaces_guard() {
        let mut device = oven(Overrides::new().transition("init", "started", |_: &Oven| false)).unwrap();
        for _ in 0..3 {
            device.advance(1.0).unwrap();
        }
        assert_eq!(device.current_state(), "init");
    }

    #[test]
    fn test_full_heat_cycle() {
        let mut device = oven(Overrides::new()).unwrap();

        device.advance(60.0).unwrap();
        assert_eq!(device.current_state(), "started");
        device.advance(60.0).unwrap();
        assert_eq!(device.current_state(), "heat");
        device.advance(60.0).unwrap();
        assert_relative_eq!(device.context().temperature, 29.0);
        device.advance(60.0).unwrap();
        assert_eq!(device.current_state(), "hold");
        assert_eq!(device.read("temperature").unwrap(), Value::Float(30.0));
    }

    #[test]
    fn test_field_set_is_frozen() {
        let mut device = oven(Overrides::new()).unwrap();

        assert!(matches!(
            device.write("temperatur", Value::Float(1.0)),
            Err(FieldError::UnknownField { .. })
        ));

        device.write("temperature_limit", Value::Float(40.0)).unwrap();
        assert_eq!(device.read("temperature_limit").unwrap(), Value::Float(40.0));
        assert_eq!(device.context().temperature_limit, 40.0);
    }

    #[test]
    fn test_initialize_data_restores_defaults() {
        let mut device = oven(Overrides::new().data("temperature_limit", 50.0)).unwrap();
        let fields_before = device.fields();

        device.write("temperature", Value::Float(80.0)).unwrap();
        device.write("ticks", Value::Int(12)).unwrap();
        device.initialize_data();

        assert_eq!(device.context().temperature, 24.0);
        assert_eq!(device.context().ticks, 0);
        // Construction-time data overrides are part of this instance's defaults
        assert_eq!(device.context().temperature_limit, 50.0);
        assert_eq!(device.fields(), fields_before);
    }

    #[test]
    fn test_extra_processors_run_after_machine() {
        let mut device = oven(Overrides::new()).unwrap();
        device.add_processor(TickCounter);

        device.advance(1.0).unwrap();
        device.advance(1.0).unwrap();
        assert_eq!(device.context().ticks, 2);
    }

    #[test]
    fn test_behavior_error_propagates() {
        let broken = FnState::new().with_enter(|_: &mut Oven| Err(BehaviorError::msg("sensor lost")));
        let mut device = oven(Overrides::new().state("started", broken)).unwrap();

        let err = device.advance(1.0).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Behavior);
        assert!(err.to_string().contains("started"));
    }

    #[test]
    fn test_setup_converts_to_overrides() {
        let setup = Setup::new().initial_state("hold").data("temperature", 30.0);
        let device = oven(setup.into()).unwrap();

        assert_eq!(device.current_state(), "hold");
        assert_eq!(device.context().temperature, 30.0);
    }
}
