//! Events
//!
//! Events carry no value. An [`EventCell`] notifies every listener on every
//! trigger; there is no change detection, so two triggers always mean two
//! deliveries.

use std::fmt;
use std::sync::Arc;

use super::cancel::Cancel;
use super::listeners::ListenerRegistry;
use crate::error::Result;
use crate::logging;

/// Trigger capability.
pub trait EventSink: Send + Sync {
    /// Fire the event. A listener failure is returned to the caller.
    fn event(&self) -> Result<()>;
}

impl<F> EventSink for F
where
    F: Fn() -> Result<()> + Send + Sync,
{
    fn event(&self) -> Result<()> {
        self()
    }
}

/// Subscription capability for an event stream.
pub trait EventSource: Send + Sync {
    /// Register `listener` to run after every event.
    fn subscribe(&self, listener: EventOutput) -> Cancel;
}

/// Shared handle to something that can be triggered.
#[derive(Clone)]
pub struct EventOutput {
    sink: Arc<dyn EventSink>,
}

impl EventOutput {
    pub fn new<S>(sink: S) -> Self
    where
        S: EventSink + 'static,
    {
        Self {
            sink: Arc::new(sink),
        }
    }

    /// Build an output from a closure.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        Self::new(f)
    }

    /// An output that discards every trigger.
    pub fn ignored() -> Self {
        Self::from_fn(|| Ok(()))
    }

    /// Raw trigger: a listener failure propagates to the caller.
    pub fn event(&self) -> Result<()> {
        self.sink.event()
    }

    /// Safe trigger: failures are logged and swallowed.
    pub fn safe_event(&self) {
        if let Err(err) = self.event() {
            logging::propagation_failure(&"event", &err);
        }
    }

    /// Fire this output whenever `source` fires.
    pub fn on(&self, source: &EventInput) -> Cancel {
        source.subscribe(self.clone())
    }

    /// True if both handles point at the same sink.
    pub fn ptr_eq(&self, other: &EventOutput) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.sink), Arc::as_ptr(&other.sink))
    }
}

impl EventSink for EventOutput {
    fn event(&self) -> Result<()> {
        self.sink.event()
    }
}

impl fmt::Debug for EventOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventOutput").finish_non_exhaustive()
    }
}

/// Shared handle to an event stream.
#[derive(Clone)]
pub struct EventInput {
    source: Arc<dyn EventSource>,
}

impl EventInput {
    pub fn new<S>(source: S) -> Self
    where
        S: EventSource + 'static,
    {
        Self {
            source: Arc::new(source),
        }
    }

    /// An event that never fires.
    pub fn never() -> Self {
        Self::new(Never)
    }

    /// Register `listener` and return the token that removes it.
    pub fn subscribe(&self, listener: EventOutput) -> Cancel {
        self.source.subscribe(listener)
    }

    /// Forward every event to `output`.
    pub fn send(&self, output: &EventOutput) -> Cancel {
        self.subscribe(output.clone())
    }

    pub fn ptr_eq(&self, other: &EventInput) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.source), Arc::as_ptr(&other.source))
    }
}

impl EventSource for EventInput {
    fn subscribe(&self, listener: EventOutput) -> Cancel {
        self.source.subscribe(listener)
    }
}

impl fmt::Debug for EventInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventInput").finish_non_exhaustive()
    }
}

struct Never;

impl EventSource for Never {
    fn subscribe(&self, _listener: EventOutput) -> Cancel {
        Cancel::noop()
    }
}

/// Mutable event source and sink in one.
#[derive(Clone, Default)]
pub struct EventCell {
    listeners: ListenerRegistry,
}

impl EventCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw trigger: notify every listener, returning aggregated failures.
    pub fn event(&self) -> Result<()> {
        self.listeners.notify()
    }

    /// Safe trigger: failures are logged and swallowed.
    pub fn safe_event(&self) {
        if let Err(err) = self.event() {
            logging::propagation_failure(&"event", &err);
        }
    }

    pub fn on_event(&self, listener: EventOutput) -> Cancel {
        self.listeners.subscribe(listener)
    }

    pub fn as_input(&self) -> EventInput {
        EventInput::new(self.listeners.clone())
    }

    pub fn as_output(&self) -> EventOutput {
        EventOutput::new(self.clone())
    }

    /// Number of registered listeners.
    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }
}

impl EventSink for EventCell {
    fn event(&self) -> Result<()> {
        EventCell::event(self)
    }
}

impl EventSource for EventCell {
    fn subscribe(&self, listener: EventOutput) -> Cancel {
        self.on_event(listener)
    }
}

impl fmt::Debug for EventCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventCell")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn events_never_dedupe() {
        let cell = EventCell::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        cell.on_event(EventOutput::from_fn(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        cell.event().unwrap();
        cell.event().unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn input_and_output_share_the_cell() {
        let cell = EventCell::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();

        cell.as_input().subscribe(EventOutput::from_fn(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));
        cell.as_output().event().unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn never_does_not_register() {
        let token = EventInput::never().subscribe(EventOutput::ignored());
        token.cancel();
    }

    #[test]
    fn output_ptr_eq_follows_clones() {
        let a = EventOutput::ignored();
        let b = a.clone();
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&EventOutput::ignored()));
    }
}
