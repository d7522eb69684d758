//! Writable channels.

use std::fmt;
use std::sync::Arc;

use super::cancel::Cancel;
use super::event::{EventInput, EventOutput};
use super::value::Value;
use crate::error::Result;
use crate::logging;

/// Write capability for values of type `V`.
pub trait ValueSink<V>: Send + Sync {
    /// Raw write. A downstream failure is returned to the caller.
    fn set(&self, value: V) -> Result<()>;
}

impl<V, F> ValueSink<V> for F
where
    F: Fn(V) -> Result<()> + Send + Sync,
{
    fn set(&self, value: V) -> Result<()> {
        self(value)
    }
}

/// Shared handle to something that accepts values.
pub struct Output<V: Value> {
    sink: Arc<dyn ValueSink<V>>,
    /// The output this one is an involution of (`invert`, `negate`).
    inverse: Option<Arc<Output<V>>>,
}

/// A writable boolean channel.
pub type BooleanOutput = Output<bool>;

/// A writable float channel.
pub type FloatOutput = Output<f32>;

impl<V: Value> Output<V> {
    pub fn new<S>(sink: S) -> Self
    where
        S: ValueSink<V> + 'static,
    {
        Self {
            sink: Arc::new(sink),
            inverse: None,
        }
    }

    /// Build an output from a closure.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(V) -> Result<()> + Send + Sync + 'static,
    {
        Self::new(f)
    }

    /// An output that discards every write.
    pub fn ignored() -> Self {
        Self::from_fn(|_| Ok(()))
    }

    /// Raw write: a downstream failure propagates to the caller.
    pub fn set(&self, value: V) -> Result<()> {
        self.sink.set(value)
    }

    /// Safe write: failures are logged together with `value` and swallowed.
    pub fn safe_set(&self, value: V) {
        if let Err(err) = self.set(value) {
            logging::propagation_failure(&value, &err);
        }
    }

    /// An event output that writes `value` here each time it fires.
    pub fn set_event(&self, value: V) -> EventOutput {
        let output = self.clone();
        EventOutput::from_fn(move || output.set(value))
    }

    /// Write `value` here every time `event` fires.
    pub fn set_when(&self, value: V, event: &EventInput) -> Cancel {
        event.subscribe(self.set_event(value))
    }

    /// Adapt the values written to this output through `f`.
    pub fn contramap<U, F>(&self, f: F) -> Output<U>
    where
        U: Value,
        F: Fn(U) -> V + Send + Sync + 'static,
    {
        let output = self.clone();
        Output::from_fn(move |value| output.set(f(value)))
    }

    /// True if both handles point at the same sink.
    pub fn ptr_eq(&self, other: &Output<V>) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.sink), Arc::as_ptr(&other.sink))
    }

    pub(crate) fn with_inverse(mut self, inverse: &Output<V>) -> Self {
        self.inverse = Some(Arc::new(inverse.clone()));
        self
    }

    pub(crate) fn inverse(&self) -> Option<&Output<V>> {
        self.inverse.as_deref()
    }
}

impl<V: Value> ValueSink<V> for Output<V> {
    fn set(&self, value: V) -> Result<()> {
        self.sink.set(value)
    }
}

impl<V: Value> Clone for Output<V> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            inverse: self.inverse.clone(),
        }
    }
}

impl<V: Value> fmt::Debug for Output<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Output").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{BooleanCell, EventCell, FloatCell};
    use crate::error::Error;

    #[test]
    fn cell_output_writes_through() {
        let cell = FloatCell::new(0.0);
        cell.as_output().set(4.0).unwrap();
        assert_eq!(cell.get(), 4.0);
    }

    #[test]
    fn set_when_writes_fixed_value() {
        let cell = BooleanCell::new(false);
        let trigger = EventCell::new();
        let token = cell.as_output().set_when(true, &trigger.as_input());

        trigger.event().unwrap();
        assert!(cell.get());

        cell.set(false).unwrap();
        token.cancel();
        trigger.event().unwrap();
        assert!(!cell.get());
    }

    #[test]
    fn safe_set_returns_normally() {
        let output = FloatOutput::from_fn(|_| Err(Error::listener("motor stalled")));
        output.safe_set(1.0);
        assert!(output.set(1.0).is_err());
    }

    #[test]
    fn contramap_adapts_values() {
        let cell = FloatCell::new(0.0);
        let scaled = cell.as_output().contramap(|v: f32| v * 10.0);
        scaled.set(0.5).unwrap();
        assert_eq!(cell.get(), 5.0);
    }
}
