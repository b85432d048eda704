//! States and transitions: the building blocks of a device's behavior.

use crate::error::BehaviorError;
use std::fmt;

/// Result of a state hook.
pub type HookResult = Result<(), BehaviorError>;

/// A named unit of device behavior.
///
/// All three hooks default to no-ops. A state keeps no memory between
/// invocations other than what it writes into the context.
///
/// # Hook order
///
/// ```text
/// tick N:   on_tick(old)  -> guard match -> on_exit(old) -> on_enter(new)
/// tick N+1: on_tick(new)  -> ...
/// ```
pub trait State<C>: Send {
    /// Called once when the machine enters this state.
    fn on_enter(&mut self, _context: &mut C) -> HookResult {
        Ok(())
    }

    /// Called every tick while this is the current state, before any guard
    /// is evaluated. `dt` is the simulated time step in seconds.
    fn on_tick(&mut self, _context: &mut C, _dt: f64) -> HookResult {
        Ok(())
    }

    /// Called once when the machine leaves this state.
    fn on_exit(&mut self, _context: &mut C) -> HookResult {
        Ok(())
    }
}

/// A state with no behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyState;

impl<C> State<C> for EmptyState {}

type EnterFn<C> = Box<dyn FnMut(&mut C) -> HookResult + Send>;
type TickFn<C> = Box<dyn FnMut(&mut C, f64) -> HookResult + Send>;

/// A state assembled from closures.
///
/// ```
/// use plankton_core::FnState;
///
/// struct Data { level: f64 }
///
/// let fill = FnState::<Data>::new()
///     .with_tick(|data, dt| {
///         data.level += dt;
///         Ok(())
///     });
/// # let _ = fill;
/// ```
pub struct FnState<C> {
    enter: Option<EnterFn<C>>,
    tick: Option<TickFn<C>>,
    exit: Option<EnterFn<C>>,
}

impl<C> FnState<C> {
    pub fn new() -> Self {
        Self {
            enter: None,
            tick: None,
            exit: None,
        }
    }

    pub fn with_enter<F>(mut self, f: F) -> Self
    where
        F: FnMut(&mut C) -> HookResult + Send + 'static,
    {
        self.enter = Some(Box::new(f));
        self
    }

    pub fn with_tick<F>(mut self, f: F) -> Self
    where
        F: FnMut(&mut C, f64) -> HookResult + Send + 'static,
    {
        self.tick = Some(Box::new(f));
        self
    }

    pub fn with_exit<F>(mut self, f: F) -> Self
    where
        F: FnMut(&mut C) -> HookResult + Send + 'static,
    {
        self.exit = Some(Box::new(f));
        self
    }
}

impl<C> Default for FnState<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> State<C> for FnState<C> {
    fn on_enter(&mut self, context: &mut C) -> HookResult {
        match self.enter.as_mut() {
            Some(f) => f(context),
            None => Ok(()),
        }
    }

    fn on_tick(&mut self, context: &mut C, dt: f64) -> HookResult {
        match self.tick.as_mut() {
            Some(f) => f(context, dt),
            None => Ok(()),
        }
    }

    fn on_exit(&mut self, context: &mut C) -> HookResult {
        match self.exit.as_mut() {
            Some(f) => f(context),
            None => Ok(()),
        }
    }
}

/// A side-effect-free predicate over the context.
pub type Guard<C> = Box<dyn Fn(&C) -> bool + Send>;

/// A guarded edge between two states.
///
/// Only evaluated while the machine is in `from`.
pub struct Transition<C> {
    pub from: String,
    pub to: String,
    pub guard: Guard<C>,
}

impl<C> Transition<C> {
    pub fn new<F>(from: impl Into<String>, to: impl Into<String>, guard: F) -> Self
    where
        F: Fn(&C) -> bool + Send + 'static,
    {
        Self {
            from: from.into(),
            to: to.into(),
            guard: Box::new(guard),
        }
    }

    /// Returns the `(from, to)` pair identifying this transition.
    pub fn key(&self) -> (&str, &str) {
        (&self.from, &self.to)
    }
}

impl<C> fmt::Debug for Transition<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("from", &self.from)
            .field("to", &self.to)
            .finish_non_exhaustive()
    }
}
