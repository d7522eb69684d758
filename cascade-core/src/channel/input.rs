//! Readable channels.

use std::fmt;
use std::sync::Arc;

use super::cancel::Cancel;
use super::derived;
use super::event::{EventInput, EventOutput};
use super::output::Output;
use super::value::{Value, ValueSource};
use crate::error::Result;

/// Read-only access to an upstream value, without its listener registry.
///
/// Compute closures of derived sources capture samplers rather than
/// [`Input`]s so that upstreams never end up owning themselves.
pub struct Sampler<V> {
    source: Arc<dyn ValueSource<V>>,
}

impl<V> Sampler<V> {
    pub fn get(&self) -> V {
        self.source.get()
    }
}

impl<V> Clone for Sampler<V> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
        }
    }
}

/// Shared handle to a readable, subscribable value.
///
/// `get` returns the last known value without side effects. `on_update`
/// registers a listener that runs after every change.
pub struct Input<V: Value> {
    source: Arc<dyn ValueSource<V>>,
    updates: EventInput,
    /// The input this one is an involution of (`not`, `negated`).
    inverse: Option<Arc<Input<V>>>,
}

/// A readable boolean channel.
pub type BooleanInput = Input<bool>;

/// A readable float channel.
pub type FloatInput = Input<f32>;

impl<V: Value> Input<V> {
    /// Assemble an input from a value source and its update stream.
    pub fn new<S>(source: S, updates: EventInput) -> Self
    where
        S: ValueSource<V> + 'static,
    {
        Self::from_parts(Arc::new(source), updates)
    }

    pub(crate) fn from_parts(source: Arc<dyn ValueSource<V>>, updates: EventInput) -> Self {
        Self {
            source,
            updates,
            inverse: None,
        }
    }

    /// An input that always reports `value` and never updates.
    pub fn constant(value: V) -> Self {
        Self::new(move || value, EventInput::never())
    }

    /// A cached source recomputed once per notification from any of
    /// `updates`.
    ///
    /// `compute` must read its upstreams through [`Input::sampler`].
    pub fn derived<F>(updates: &[EventInput], compute: F) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
    {
        derived::derive(updates, compute)
    }

    /// Get the current value.
    pub fn get(&self) -> V {
        self.source.get()
    }

    /// A registry-free reader of this input.
    pub fn sampler(&self) -> Sampler<V> {
        Sampler {
            source: Arc::clone(&self.source),
        }
    }

    /// The stream of change notifications.
    pub fn updates(&self) -> EventInput {
        self.updates.clone()
    }

    /// Register `listener` to run after every change.
    pub fn on_update(&self, listener: EventOutput) -> Cancel {
        self.updates.subscribe(listener)
    }

    /// Write the current value into `output` now, then again after every
    /// change.
    pub fn send(&self, output: &Output<V>) -> Result<Cancel> {
        output.set(self.get())?;
        let value = self.sampler();
        let output = output.clone();
        Ok(self.on_update(EventOutput::from_fn(move || output.set(value.get()))))
    }

    /// Derive through a pure function.
    pub fn map<U, F>(&self, f: F) -> Input<U>
    where
        U: Value,
        F: Fn(V) -> U + Send + Sync + 'static,
    {
        derived::map(self, f)
    }

    /// Derive from this input and `other` through a pure function.
    pub fn zip_with<W, U, F>(&self, other: &Input<W>, f: F) -> Input<U>
    where
        W: Value,
        U: Value,
        F: Fn(V, W) -> U + Send + Sync + 'static,
    {
        derived::zip_with(self, other, f)
    }

    /// True if both handles read from the same source.
    pub fn ptr_eq(&self, other: &Input<V>) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.source), Arc::as_ptr(&other.source))
    }

    pub(crate) fn with_inverse(mut self, inverse: &Input<V>) -> Self {
        self.inverse = Some(Arc::new(inverse.clone()));
        self
    }

    pub(crate) fn inverse(&self) -> Option<&Input<V>> {
        self.inverse.as_deref()
    }
}

impl<V: Value> Clone for Input<V> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            updates: self.updates.clone(),
            inverse: self.inverse.clone(),
        }
    }
}

impl<V: Value> From<V> for Input<V> {
    fn from(value: V) -> Self {
        Input::constant(value)
    }
}

impl<V: Value> From<&Input<V>> for Input<V> {
    fn from(input: &Input<V>) -> Self {
        input.clone()
    }
}

impl<V: Value> fmt::Debug for Input<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Input").field("value", &self.get()).finish()
    }
}
