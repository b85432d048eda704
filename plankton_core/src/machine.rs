//! The state-machine engine.
//!
//! One call to [`StateMachine::advance`] is one evaluation cycle:
//!
//! 1. `on_tick` of the current state.
//! 2. Scan the transition list in declared order, skipping transitions whose
//!    source is not the current state. The first guard that holds fires; the
//!    rest are not evaluated this tick.
//! 3. If one fired: `on_exit` of the source, switch, `on_enter` of the target.
//!    The target's `on_tick` first runs on the next call.
//!
//! When no guard holds the machine simply stays where it is.

use crate::error::{BehaviorError, ConfigError};
use crate::state::{State, Transition};
use std::collections::HashSet;
use tracing::debug;

/// The state table of a machine: `(name, state)` in declaration order.
pub type StateTable<C> = Vec<(String, Box<dyn State<C>>)>;

/// A transition with both endpoints resolved to state-table indices.
struct Edge<C> {
    from: usize,
    to: usize,
    transition: Transition<C>,
}

/// A finite state machine over a context of type `C`.
///
/// The machine does not own the context; the device that owns both passes it
/// in on every call.
pub struct StateMachine<C> {
    /// State table, in declaration order
    states: StateTable<C>,

    /// Transitions, in declaration order
    edges: Vec<Edge<C>>,

    /// Index of the initial state
    initial: usize,

    /// Index of the current state
    current: usize,

    /// Whether `on_enter` of the initial state has run
    entered: bool,
}

impl<C> StateMachine<C> {
    /// Creates a machine and validates its tables.
    ///
    /// # Errors
    /// - [`ConfigError::DuplicateState`] if a state name repeats
    /// - [`ConfigError::UnknownInitialState`] if `initial` is not in the table
    /// - [`ConfigError::TransitionToUnknownState`] if an edge names an undeclared state
    /// - [`ConfigError::DuplicateTransition`] if an ordered pair repeats
    pub fn new(
        states: StateTable<C>,
        transitions: Vec<Transition<C>>,
        initial: &str,
    ) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for (name, _) in &states {
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::DuplicateState(name.clone()));
            }
        }

        let index_of = |name: &str| states.iter().position(|(n, _)| n == name);

        let initial = index_of(initial)
            .ok_or_else(|| ConfigError::UnknownInitialState(initial.to_string()))?;

        let mut pairs = HashSet::new();
        let mut edges = Vec::with_capacity(transitions.len());

        for transition in transitions {
            let resolve = |state: &str| {
                index_of(state).ok_or_else(|| ConfigError::TransitionToUnknownState {
                    from: transition.from.clone(),
                    to: transition.to.clone(),
                    state: state.to_string(),
                })
            };
            let from = resolve(&transition.from)?;
            let to = resolve(&transition.to)?;

            if !pairs.insert((from, to)) {
                return Err(ConfigError::DuplicateTransition {
                    from: transition.from.clone(),
                    to: transition.to.clone(),
                });
            }

            edges.push(Edge {
                from,
                to,
                transition,
            });
        }

        Ok(Self {
            states,
            edges,
            initial,
            current: initial,
            entered: false,
        })
    }

    /// Runs one evaluation cycle with simulated time step `dt` (seconds).
    ///
    /// On the very first call the initial state's `on_enter` runs before its
    /// `on_tick`.
    pub fn advance(&mut self, context: &mut C, dt: f64) -> Result<(), BehaviorError> {
        if !self.entered {
            self.entered = true;
            let current = self.current;
            self.states[current]
                .1
                .on_enter(context)
                .map_err(|e| self.attribute(current, e))?;
        }

        let current = self.current;
        self.states[current]
            .1
            .on_tick(context, dt)
            .map_err(|e| self.attribute(current, e))?;

        let snapshot: &C = context;
        let target = self
            .edges
            .iter()
            .filter(|edge| edge.from == current)
            .find(|edge| (edge.transition.guard)(snapshot))
            .map(|edge| edge.to);

        if let Some(target) = target {
            self.fire(context, current, target)?;
        }

        Ok(())
    }

    /// Executes a transition: exit hook, switch, enter hook.
    fn fire(&mut self, context: &mut C, from: usize, to: usize) -> Result<(), BehaviorError> {
        debug!(
            from = %self.states[from].0,
            to = %self.states[to].0,
            "state transition"
        );

        self.states[from]
            .1
            .on_exit(context)
            .map_err(|e| self.attribute(from, e))?;

        self.current = to;

        self.states[to]
            .1
            .on_enter(context)
            .map_err(|e| self.attribute(to, e))
    }

    /// Fills in the state name of a fault raised by an anonymous hook.
    fn attribute(&self, index: usize, mut error: BehaviorError) -> BehaviorError {
        if error.state.is_empty() {
            error.state = self.states[index].0.clone();
        }
        error
    }

    /// Returns the name of the current state.
    pub fn current_state(&self) -> &str {
        &self.states[self.current].0
    }

    /// Returns the name of the initial state.
    pub fn initial_state(&self) -> &str {
        &self.states[self.initial].0
    }

    /// Returns all state names in declaration order.
    pub fn state_names(&self) -> impl Iterator<Item = &str> {
        self.states.iter().map(|(name, _)| name.as_str())
    }

    /// Returns all transitions as `(from, to)` pairs in declaration order.
    pub fn transitions(&self) -> Vec<(&str, &str)> {
        self.edges.iter().map(|edge| edge.transition.key()).collect()
    }

    /// Returns the machine to its initial state. The initial state's
    /// `on_enter` runs again on the next `advance`.
    pub fn reset(&mut self) {
        self.current = self.initial;
        self.entered = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{EmptyState, FnState};
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[derive(Debug, Clone, PartialEq, Default)]
    struct Oven {
        temperature: f64,
        temperature_limit: f64,
        temperature_rate: f64,
        log: Vec<String>,
    }

    impl Oven {
        fn new() -> Self {
            Self {
                temperature: 24.0,
                temperature_limit: 30.0,
                temperature_rate: 5.0,
                log: Vec::new(),
            }
        }
    }

    fn logging(name: &'static str) -> Box<dyn State<Oven>> {
        Box::new(
            FnState::new()
                .with_enter(move |o: &mut Oven| {
                    o.log.push(format!("enter:{}", name));
                    Ok(())
                })
                .with_tick(move |o: &mut Oven, _| {
                    o.log.push(format!("tick:{}", name));
                    Ok(())
                })
                .with_exit(move |o: &mut Oven| {
                    o.log.push(format!("exit:{}", name));
                    Ok(())
                }),
        )
    }

    fn table(names: &[&'static str]) -> StateTable<Oven> {
        names.iter().map(|n| (n.to_string(), logging(n))).collect()
    }

    /// started/heat/hold/cool oven with rate-limited ramps.
    fn oven_machine() -> StateMachine<Oven> {
        let heat = FnState::new().with_tick(|o: &mut Oven, dt| {
            o.temperature =
                (o.temperature + o.temperature_rate * dt / 60.0).min(o.temperature_limit);
            Ok(())
        });
        let cool = FnState::new().with_tick(|o: &mut Oven, dt| {
            o.temperature =
                (o.temperature - o.temperature_rate * dt / 60.0).max(o.temperature_limit);
            Ok(())
        });

        let states: StateTable<Oven> = vec![
            ("started".to_string(), Box::new(EmptyState)),
            ("heat".to_string(), Box::new(heat)),
            ("hold".to_string(), Box::new(EmptyState)),
            ("cool".to_string(), Box::new(cool)),
        ];

        let transitions = vec![
            Transition::new("started", "heat", |o: &Oven| o.temperature < o.temperature_limit),
            Transition::new("started", "hold", |o: &Oven| o.temperature == o.temperature_limit),
            Transition::new("started", "cool", |o: &Oven| o.temperature > o.temperature_limit),
            Transition::new("heat", "hold", |o: &Oven| o.temperature == o.temperature_limit),
            Transition::new("heat", "cool", |o: &Oven| o.temperature > o.temperature_limit),
            Transition::new("hold", "heat", |o: &Oven| o.temperature < o.temperature_limit),
            Transition::new("hold", "cool", |o: &Oven| o.temperature > o.temperature_limit),
            Transition::new("cool", "heat", |o: &Oven| o.temperature < o.temperature_limit),
            Transition::new("cool", "hold", |o: &Oven| o.temperature == o.temperature_limit),
        ];

        StateMachine::new(states, transitions, "started").unwrap()
    }

    #[test]
    fn test_heat_hold_scenario() {
        let mut machine = oven_machine();
        let mut oven = Oven::new();

        // started: no-op tick, guard 24 < 30 fires
        machine.advance(&mut oven, 60.0).unwrap();
        assert_eq!(machine.current_state(), "heat");
        assert_relative_eq!(oven.temperature, 24.0);

        // heat: 24 + 5 * 60/60, not yet at the limit
        machine.advance(&mut oven, 60.0).unwrap();
        assert_eq!(machine.current_state(), "heat");
        assert_relative_eq!(oven.temperature, 29.0);

        // heat: clamped to exactly 30, (heat, hold) fires
        machine.advance(&mut oven, 60.0).unwrap();
        assert_eq!(oven.temperature, 30.0);
        assert_eq!(machine.current_state(), "hold");

        // Lowering the limit sends the oven into cool
        oven.temperature_limit = 20.0;
        machine.advance(&mut oven, 60.0).unwrap();
        assert_eq!(machine.current_state(), "cool");
    }

    #[test]
    fn test_first_match_wins() {
        let transitions = vec![
            Transition::new("s", "a", |_: &Oven| true),
            Transition::new("s", "b", |_: &Oven| true),
        ];
        let mut machine = StateMachine::new(table(&["s", "a", "b"]), transitions, "s").unwrap();
        let mut oven = Oven::new();

        machine.advance(&mut oven, 1.0).unwrap();
        assert_eq!(machine.current_state(), "a");
        assert!(!oven.log.iter().any(|e| e.ends_with(":b")));
    }

    #[test]
    fn test_declaration_order_not_target_order() {
        // Same as above, declared the other way round
        let transitions = vec![
            Transition::new("s", "b", |_: &Oven| true),
            Transition::new("s", "a", |_: &Oven| true),
        ];
        let mut machine = StateMachine::new(table(&["s", "a", "b"]), transitions, "s").unwrap();
        machine.advance(&mut Oven::new(), 1.0).unwrap();
        assert_eq!(machine.current_state(), "b");
    }

    #[test]
    fn test_no_match_only_ticks() {
        let transitions = vec![Transition::new("s", "a", |_: &Oven| false)];
        let mut machine = StateMachine::new(table(&["s", "a"]), transitions, "s").unwrap();
        let mut oven = Oven::new();

        machine.advance(&mut oven, 1.0).unwrap();
        oven.log.clear();
        machine.advance(&mut oven, 1.0).unwrap();

        assert_eq!(machine.current_state(), "s");
        assert_eq!(oven.log, vec!["tick:s"]);
    }

    #[test]
    fn test_hook_order_across_a_transition() {
        let transitions = vec![Transition::new("s", "a", |_: &Oven| true)];
        let mut machine = StateMachine::new(table(&["s", "a"]), transitions, "s").unwrap();
        let mut oven = Oven::new();

        machine.advance(&mut oven, 1.0).unwrap();
        assert_eq!(oven.log, vec!["enter:s", "tick:s", "exit:s", "enter:a"]);

        machine.advance(&mut oven, 1.0).unwrap();
        assert_eq!(oven.log.last().map(String::as_str), Some("tick:a"));
    }

    #[test]
    fn test_guard_sees_context_after_tick() {
        let states: StateTable<Oven> = vec![
            (
                "s".to_string(),
                Box::new(FnState::new().with_tick(|o: &mut Oven, _| {
                    o.temperature = 100.0;
                    Ok(())
                })),
            ),
            ("hot".to_string(), Box::new(EmptyState)),
        ];
        let transitions = vec![Transition::new("s", "hot", |o: &Oven| o.temperature > 50.0)];
        let mut machine = StateMachine::new(states, transitions, "s").unwrap();

        machine.advance(&mut Oven::new(), 1.0).unwrap();
        assert_eq!(machine.current_state(), "hot");
    }

    #[test]
    fn test_self_transition_exits_and_reenters() {
        let transitions = vec![Transition::new("s", "s", |_: &Oven| true)];
        let mut machine = StateMachine::new(table(&["s"]), transitions, "s").unwrap();
        let mut oven = Oven::new();

        machine.advance(&mut oven, 1.0).unwrap();
        assert_eq!(oven.log, vec!["enter:s", "tick:s", "exit:s", "enter:s"]);
        assert_eq!(machine.current_state(), "s");
    }

    #[test]
    fn test_terminal_state_is_legal() {
        let transitions = vec![Transition::new("s", "end", |_: &Oven| true)];
        let mut machine = StateMachine::new(table(&["s", "end"]), transitions, "s").unwrap();
        let mut oven = Oven::new();

        for _ in 0..5 {
            machine.advance(&mut oven, 1.0).unwrap();
        }
        assert_eq!(machine.current_state(), "end");
    }

    #[test]
    fn test_unknown_initial_state_fails_construction() {
        let result = StateMachine::new(table(&["s"]), Vec::new(), "missing");
        assert!(matches!(result, Err(ConfigError::UnknownInitialState(ref s)) if s == "missing"));
    }

    #[test]
    fn test_invalid_tables_fail_construction() {
        let result = StateMachine::new(table(&["s", "s"]), Vec::new(), "s");
        assert!(matches!(result, Err(ConfigError::DuplicateState(_))));

        let transitions = vec![Transition::new("s", "nowhere", |_: &Oven| true)];
        let result = StateMachine::new(table(&["s"]), transitions, "s");
        assert!(matches!(
            result,
            Err(ConfigError::TransitionToUnknownState { ref state, .. }) if state == "nowhere"
        ));

        let transitions = vec![
            Transition::new("s", "a", |_: &Oven| true),
            Transition::new("s", "a", |_: &Oven| false),
        ];
        let result = StateMachine::new(table(&["s", "a"]), transitions, "s");
        assert!(matches!(result, Err(ConfigError::DuplicateTransition { .. })));
    }

    #[test]
    fn test_hook_fault_names_the_state() {
        let states: StateTable<Oven> = vec![(
            "heat".to_string(),
            Box::new(FnState::new().with_tick(|_: &mut Oven, _| Err(BehaviorError::msg("runaway")))),
        )];
        let mut machine = StateMachine::new(states, Vec::new(), "heat").unwrap();

        let err = machine.advance(&mut Oven::new(), 1.0).unwrap_err();
        assert_eq!(err.state, "heat");
        assert_eq!(err.message, "runaway");
    }

    #[test]
    fn test_reset_reenters_initial_state() {
        let transitions = vec![Transition::new("s", "a", |_: &Oven| true)];
        let mut machine = StateMachine::new(table(&["s", "a"]), transitions, "s").unwrap();
        let mut oven = Oven::new();

        machine.advance(&mut oven, 1.0).unwrap();
        machine.reset();
        assert_eq!(machine.current_state(), "s");

        oven.log.clear();
        machine.advance(&mut oven, 1.0).unwrap();
        assert_eq!(oven.log[0], "enter:s");
    }

    #[test]
    fn test_introspection() {
        let machine = oven_machine();
        assert_eq!(machine.initial_state(), "started");
        assert_eq!(
            machine.state_names().collect::<Vec<_>>(),
            vec!["started", "heat", "hold", "cool"]
        );
        assert_eq!(machine.transitions()[0], ("started", "heat"));
        assert_eq!(machine.transitions().len(), 9);
    }

    proptest! {
        #[test]
        fn prop_advance_is_deterministic(
            steps in prop::collection::vec((0.0f64..120.0, 0.0f64..60.0), 1..64)
        ) {
            let run = || {
                let mut machine = oven_machine();
                let mut oven = Oven::new();
                let mut trajectory = Vec::new();
                for (dt, limit) in &steps {
                    oven.temperature_limit = *limit;
                    machine.advance(&mut oven, *dt).unwrap();
                    trajectory.push((machine.current_state().to_string(), oven.temperature));
                }
                trajectory
            };

            prop_assert_eq!(run(), run());
        }
    }
}
