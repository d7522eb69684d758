//! Gates
//!
//! A gate lets propagation through only while a boolean condition is open.
//!
//! # Input Gates
//!
//! [`Input::filter_updates`] suppresses notifications while closed but keeps
//! reading the live upstream value. The gate remembers the value it last let
//! through; when it opens and the upstream has changed since, one catch-up
//! notification fires.
//!
//! # Output Gates
//!
//! [`Output::filter`] drops writes while closed, remembering the most recent
//! one. When the gate opens, that write is flushed. Event outputs have
//! nothing to remember, so a closed [`EventOutput::filter`] simply drops.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::channel::{
    BooleanInput, EventInput, EventOutput, Input, ListenerRegistry, Output, Sampler, Value,
};
use crate::error::Result;

struct UpdateGate<V: Value> {
    value: Sampler<V>,
    open: Sampler<bool>,
    /// The value most recently let through.
    delivered: Mutex<V>,
    listeners: ListenerRegistry,
}

impl<V: Value> UpdateGate<V> {
    fn upstream_changed(&self) -> Result<()> {
        if !self.open.get() {
            return Ok(());
        }
        *self.delivered.lock() = self.value.get();
        self.listeners.notify()
    }

    fn gate_changed(&self) -> Result<()> {
        if !self.open.get() {
            return Ok(());
        }
        let current = self.value.get();
        let stale = {
            let mut delivered = self.delivered.lock();
            let stale = !delivered.same(current);
            *delivered = current;
            stale
        };
        if stale {
            self.listeners.notify()
        } else {
            Ok(())
        }
    }
}

struct WriteGate<V: Value> {
    target: Output<V>,
    open: Sampler<bool>,
    /// The latest write attempted while closed.
    pending: Mutex<Option<V>>,
}

impl<V: Value> WriteGate<V> {
    fn write(&self, value: V) -> Result<()> {
        if self.open.get() {
            self.pending.lock().take();
            self.target.set(value)
        } else {
            *self.pending.lock() = Some(value);
            Ok(())
        }
    }

    fn gate_changed(&self) -> Result<()> {
        if !self.open.get() {
            return Ok(());
        }
        let pending = self.pending.lock().take();
        match pending {
            Some(value) => self.target.set(value),
            None => Ok(()),
        }
    }
}

impl<V: Value> Input<V> {
    /// Notify downstream only while `allow` is true. See the module docs.
    pub fn filter_updates(&self, allow: &BooleanInput) -> Input<V> {
        let gate = Arc::new(UpdateGate {
            value: self.sampler(),
            open: allow.sampler(),
            delivered: Mutex::new(self.get()),
            listeners: ListenerRegistry::new(),
        });

        let on_value = Arc::clone(&gate);
        self.on_update(EventOutput::from_fn(move || on_value.upstream_changed()));
        let on_gate = Arc::clone(&gate);
        allow.on_update(EventOutput::from_fn(move || on_gate.gate_changed()));

        let value = self.sampler();
        Input::new(move || value.get(), EventInput::new(gate.listeners.clone()))
    }

    /// Notify downstream only while `deny` is false.
    pub fn filter_updates_not(&self, deny: &BooleanInput) -> Input<V> {
        self.filter_updates(&deny.not())
    }
}

impl<V: Value> Output<V> {
    /// Pass writes through only while `allow` is true. See the module docs.
    pub fn filter(&self, allow: &BooleanInput) -> Output<V> {
        let gate = Arc::new(WriteGate {
            target: self.clone(),
            open: allow.sampler(),
            pending: Mutex::new(None),
        });

        let on_gate = Arc::clone(&gate);
        allow.on_update(EventOutput::from_fn(move || on_gate.gate_changed()));
        Output::from_fn(move |value| gate.write(value))
    }

    /// Pass writes through only while `deny` is false.
    pub fn filter_not(&self, deny: &BooleanInput) -> Output<V> {
        self.filter(&deny.not())
    }
}

impl EventOutput {
    /// Forward triggers here only while `allow` is true.
    pub fn filter(&self, allow: &BooleanInput) -> EventOutput {
        let open = allow.sampler();
        let target = self.clone();
        EventOutput::from_fn(move || if open.get() { target.event() } else { Ok(()) })
    }

    /// Forward triggers here only while `deny` is false.
    pub fn filter_not(&self, deny: &BooleanInput) -> EventOutput {
        self.filter(&deny.not())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{BooleanCell, EventCell, FloatCell};
    use crate::ops::boolean::count_events;
    use std::sync::atomic::Ordering;

    #[test]
    fn closed_input_gate_reads_live_but_stays_quiet() {
        let value = FloatCell::new(0.0);
        let allow = BooleanCell::new(false);
        let gated = value.as_input().filter_updates(&allow.as_input());
        let count = count_events(&gated.updates());

        value.set(1.0).unwrap();
        value.set(2.0).unwrap();
        assert_eq!(gated.get(), 2.0);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        allow.set(true).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        value.set(3.0).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn reopening_without_change_is_silent() {
        let value = FloatCell::new(1.0);
        let allow = BooleanCell::new(true);
        let gated = value.as_input().filter_updates(&allow.as_input());
        let count = count_events(&gated.updates());

        allow.set(false).unwrap();
        value.set(2.0).unwrap();
        value.set(1.0).unwrap();
        allow.set(true).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn filter_updates_not_inverts_the_gate() {
        let value = BooleanCell::new(false);
        let deny = BooleanCell::new(true);
        let gated = value.as_input().filter_updates_not(&deny.as_input());
        let count = count_events(&gated.updates());

        value.set(true).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);
        deny.set(false).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn output_gate_flushes_latest_write() {
        let sink = FloatCell::new(0.0);
        let allow = BooleanCell::new(false);
        let gated = sink.as_output().filter(&allow.as_input());

        gated.set(1.0).unwrap();
        gated.set(2.0).unwrap();
        assert_eq!(sink.get(), 0.0);

        allow.set(true).unwrap();
        assert_eq!(sink.get(), 2.0);

        gated.set(3.0).unwrap();
        assert_eq!(sink.get(), 3.0);

        // Nothing pending: reopening writes nothing.
        allow.set(false).unwrap();
        sink.set(9.0).unwrap();
        allow.set(true).unwrap();
        assert_eq!(sink.get(), 9.0);
    }

    #[test]
    fn output_filter_not() {
        let sink = BooleanCell::new(false);
        let deny = BooleanCell::new(true);
        let gated = sink.as_output().filter_not(&deny.as_input());

        gated.set(true).unwrap();
        assert!(!sink.get());
        deny.set(false).unwrap();
        assert!(sink.get());
    }

    #[test]
    fn event_gate_drops_without_flushing() {
        let target = EventCell::new();
        let count = count_events(&target.as_input());
        let allow = BooleanCell::new(false);
        let gated = target.as_output().filter(&allow.as_input());

        gated.event().unwrap();
        allow.set(true).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);

        gated.event().unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        let blocked = target.as_output().filter_not(&allow.as_input());
        blocked.event().unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
