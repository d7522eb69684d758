//! State Machine
//!
//! A fixed, ordered list of named states with one current state, built
//! entirely from channels: the current index is a [`Cell`], each state has
//! an "is this state" boolean input and enter/exit event streams.
//!
//! # Transitions
//!
//! [`StateMachine::set_state`] validates its target, then:
//!
//! 1. does nothing if the target is already current
//! 2. otherwise fires, in this order: exit of the old state, any-exit,
//!    enter of the new state, any-enter
//! 3. then stores the new index, which updates every `is_state` input
//!
//! Every hook runs even if an earlier one fails; failures are aggregated as
//! in any other fan-out. Transitions are serialized by a reentrant lock, so
//! two threads never interleave their hops.
//!
//! # Transitions From Hooks
//!
//! A hook (or an `is_state` listener) may request a transition on its own
//! machine. The request is queued and runs as a separate hop once the
//! current hop has stored its index, so it sees the new state as its
//! origin. Queued hops run in request order and the last one wins. Their
//! failures are reported by the outermost `set_state` call; the nested call
//! returns `Ok(())` once its target is queued.
//!
//! # Ownership
//!
//! Wiring created by the machine (`set_state_when` and friends) refers back
//! to it weakly. A hook that triggers a transition on its own machine
//! therefore does not keep the machine alive.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexSet;
use parking_lot::ReentrantMutex;

use crate::channel::{
    BooleanInput, Cancel, Cell, EventCell, EventInput, EventOutput, Input, Output, Value,
};
use crate::error::{Error, Result};
use crate::logging;
use crate::propagation::Failures;

/// Anything that names a state: its name or its index.
pub trait StateKey {
    /// Resolve to an index into `names`.
    fn resolve(&self, names: &IndexSet<String>) -> Result<usize>;
}

impl StateKey for str {
    fn resolve(&self, names: &IndexSet<String>) -> Result<usize> {
        names
            .get_index_of(self)
            .ok_or_else(|| Error::invalid_argument(format!("unknown state '{self}'")))
    }
}

impl StateKey for String {
    fn resolve(&self, names: &IndexSet<String>) -> Result<usize> {
        self.as_str().resolve(names)
    }
}

impl StateKey for usize {
    fn resolve(&self, names: &IndexSet<String>) -> Result<usize> {
        if *self < names.len() {
            Ok(*self)
        } else {
            Err(Error::invalid_argument(format!(
                "state index {self} out of range for {} states",
                names.len()
            )))
        }
    }
}

impl<T: StateKey + ?Sized> StateKey for &T {
    fn resolve(&self, names: &IndexSet<String>) -> Result<usize> {
        (**self).resolve(names)
    }
}

/// Hop bookkeeping, only touched by the thread holding the transition lock.
#[derive(Default)]
struct Hops {
    in_progress: bool,
    queued: VecDeque<usize>,
}

struct Inner {
    names: IndexSet<String>,
    current: Cell<usize>,
    transition: ReentrantMutex<RefCell<Hops>>,
    enter: Vec<EventCell>,
    exit: Vec<EventCell>,
    any_enter: EventCell,
    any_exit: EventCell,
    is_state: Vec<BooleanInput>,
}

impl Inner {
    fn transition_to(&self, target: usize) -> Result<()> {
        let hops = self.transition.lock();
        {
            let mut hops = hops.borrow_mut();
            if hops.in_progress {
                hops.queued.push_back(target);
                return Ok(());
            }
            hops.in_progress = true;
        }

        let mut failures = Failures::default();
        let mut next = Some(target);
        while let Some(target) = next {
            failures.record(self.hop(target));
            next = hops.borrow_mut().queued.pop_front();
        }
        hops.borrow_mut().in_progress = false;
        failures.finish()
    }

    /// One exit/enter hop from the current state to `target`.
    fn hop(&self, target: usize) -> Result<()> {
        let current = self.current.get();
        if current == target {
            return Ok(());
        }
        tracing::debug!(
            from = %self.names[current],
            to = %self.names[target],
            "state transition"
        );

        let mut failures = Failures::default();
        failures.record(self.exit[current].event());
        failures.record(self.any_exit.event());
        failures.record(self.enter[target].event());
        failures.record(self.any_enter.event());
        failures.record(self.current.set(target));
        failures.finish()
    }
}

/// A named-state machine.
///
/// # Example
///
/// ```rust
/// use cascade_core::state_machine::StateMachine;
///
/// let machine = StateMachine::new("idle", ["idle", "intake", "shoot"]).unwrap();
/// let shooting = machine.is_state("shoot").unwrap();
///
/// machine.set_state("shoot").unwrap();
/// assert!(shooting.get());
/// assert_eq!(machine.state_name(), "shoot");
/// ```
#[derive(Clone)]
pub struct StateMachine {
    inner: Arc<Inner>,
}

impl StateMachine {
    /// A machine over `names`, starting in `initial`.
    ///
    /// Names must be non-empty and unique; `initial` must be one of them.
    pub fn new<I, S>(initial: &str, names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = Self::collect_names(names)?;
        let initial = initial.resolve(&names)?;
        Ok(Self::build(names, initial))
    }

    /// A machine over `names`, starting at index `initial`.
    pub fn with_initial_index<I, S>(initial: usize, names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = Self::collect_names(names)?;
        let initial = initial.resolve(&names)?;
        Ok(Self::build(names, initial))
    }

    fn collect_names<I, S>(names: I) -> Result<IndexSet<String>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = IndexSet::new();
        for name in names {
            let name = name.into();
            if name.is_empty() {
                return Err(Error::invalid_argument("state names must not be empty"));
            }
            if let Some(existing) = set.get(&name) {
                return Err(Error::invalid_argument(format!(
                    "duplicate state name '{existing}'"
                )));
            }
            set.insert(name);
        }
        Ok(set)
    }

    fn build(names: IndexSet<String>, initial: usize) -> Self {
        let count = names.len();
        let current = Cell::new(initial);
        let is_state = (0..count)
            .map(|index| current.as_input().map(move |c| c == index))
            .collect();

        Self {
            inner: Arc::new(Inner {
                names,
                current,
                transition: ReentrantMutex::new(RefCell::new(Hops::default())),
                enter: (0..count).map(|_| EventCell::new()).collect(),
                exit: (0..count).map(|_| EventCell::new()).collect(),
                any_enter: EventCell::new(),
                any_exit: EventCell::new(),
                is_state,
            }),
        }
    }

    fn index<K: StateKey>(&self, key: K) -> Result<usize> {
        key.resolve(&self.inner.names)
    }

    fn weak(&self) -> Weak<Inner> {
        Arc::downgrade(&self.inner)
    }

    /// Transition to `key`. Unknown states are configuration errors; hook
    /// failures are returned after every hook has run.
    pub fn set_state<K: StateKey>(&self, key: K) -> Result<()> {
        let target = self.index(key)?;
        self.inner.transition_to(target)
    }

    /// Like [`set_state`](Self::set_state), but hook failures are logged
    /// and swallowed. Unknown states are still returned.
    pub fn safe_set_state<K: StateKey>(&self, key: K) -> Result<()> {
        let target = self.index(key)?;
        if let Err(err) = self.inner.transition_to(target) {
            logging::propagation_failure(&self.inner.names[target], &err);
        }
        Ok(())
    }

    /// Transition to `key` every time `event` fires.
    pub fn set_state_when<K: StateKey>(&self, key: K, event: &EventInput) -> Result<Cancel> {
        let target = self.index(key)?;
        let machine = self.weak();
        Ok(event.subscribe(EventOutput::from_fn(move || match machine.upgrade() {
            Some(inner) => inner.transition_to(target),
            None => Ok(()),
        })))
    }

    /// Transition to `to` every time `event` fires. `from` is validated but
    /// the transition does not depend on the current state.
    pub fn transition_state_when<F: StateKey, T: StateKey>(
        &self,
        from: F,
        to: T,
        event: &EventInput,
    ) -> Result<Cancel> {
        self.index(from)?;
        self.set_state_when(to, event)
    }

    /// True while `key` is the current state.
    pub fn is_state<K: StateKey>(&self, key: K) -> Result<BooleanInput> {
        Ok(self.inner.is_state[self.index(key)?].clone())
    }

    /// True while `key` is not the current state.
    pub fn is_not_state<K: StateKey>(&self, key: K) -> Result<BooleanInput> {
        Ok(self.is_state(key)?.not())
    }

    /// Fires on every transition into `key`.
    pub fn on_enter_state<K: StateKey>(&self, key: K) -> Result<EventInput> {
        Ok(self.inner.enter[self.index(key)?].as_input())
    }

    /// Fires on every transition out of `key`.
    pub fn on_exit_state<K: StateKey>(&self, key: K) -> Result<EventInput> {
        Ok(self.inner.exit[self.index(key)?].as_input())
    }

    /// Fires on every transition, after the exit hooks.
    pub fn on_enter(&self) -> EventInput {
        self.inner.any_enter.as_input()
    }

    /// Fires on every transition, before the enter hooks.
    pub fn on_exit(&self) -> EventInput {
        self.inner.any_exit.as_input()
    }

    /// Fire `output` on every transition into `key`.
    pub fn when_entering<K: StateKey>(&self, key: K, output: &EventOutput) -> Result<Cancel> {
        Ok(self.inner.enter[self.index(key)?].on_event(output.clone()))
    }

    /// Fire `output` on every transition out of `key`.
    pub fn when_exiting<K: StateKey>(&self, key: K, output: &EventOutput) -> Result<Cancel> {
        Ok(self.inner.exit[self.index(key)?].on_event(output.clone()))
    }

    /// Write `value` into `output` on every transition into `key`.
    pub fn set_on_enter_state<K: StateKey, V: Value>(
        &self,
        key: K,
        output: &Output<V>,
        value: V,
    ) -> Result<Cancel> {
        self.when_entering(key, &output.set_event(value))
    }

    /// Write `value` into `output` on every transition out of `key`.
    pub fn set_on_exit_state<K: StateKey, V: Value>(
        &self,
        key: K,
        output: &Output<V>,
        value: V,
    ) -> Result<Cancel> {
        self.when_exiting(key, &output.set_event(value))
    }

    /// Index of the current state.
    pub fn state(&self) -> usize {
        self.inner.current.get()
    }

    /// Name of the current state.
    pub fn state_name(&self) -> &str {
        &self.inner.names[self.state()]
    }

    /// The current index as a channel.
    pub fn state_input(&self) -> Input<usize> {
        self.inner.current.as_input()
    }

    pub fn number_of_states(&self) -> usize {
        self.inner.names.len()
    }

    pub fn name_of(&self, index: usize) -> Option<&str> {
        self.inner.names.get_index(index).map(String::as_str)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.inner.names.get_index_of(name)
    }
}

impl fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("states", &self.inner.names)
            .field("current", &self.state_name())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
