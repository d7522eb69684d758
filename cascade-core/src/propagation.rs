//! Propagation & Failure Isolation
//!
//! # How Fan-Out Works
//!
//! [`Output::combine`] and [`EventOutput::combine`] build one sink from many.
//! A write to the combined sink is delivered to every member in order, even
//! after a member has failed. The failures are then folded by [`Failures`]:
//!
//! - no failure: `Ok(())`
//! - one failure: that error, untouched
//! - several: the first, with the rest attached via [`Error::suppress`]
//!
//! Combining zero sinks gives a sink that discards everything. Combining
//! exactly one returns that sink itself.

use smallvec::SmallVec;

use crate::channel::{EventOutput, EventSink, Output, Value, ValueSink};
use crate::error::{Error, Result};

/// Collects the outcome of a fan-out.
#[derive(Debug, Default)]
pub(crate) struct Failures {
    first: Option<Error>,
}

impl Failures {
    pub(crate) fn record(&mut self, outcome: Result<()>) {
        if let Err(err) = outcome {
            self.first = Some(match self.first.take() {
                None => err,
                Some(primary) => primary.suppress(err),
            });
        }
    }

    pub(crate) fn finish(self) -> Result<()> {
        match self.first {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }
}

struct EventFanOut {
    members: SmallVec<[EventOutput; 4]>,
}

impl EventSink for EventFanOut {
    fn event(&self) -> Result<()> {
        let mut failures = Failures::default();
        for member in &self.members {
            failures.record(member.event());
        }
        failures.finish()
    }
}

struct ValueFanOut<V: Value> {
    members: SmallVec<[Output<V>; 4]>,
}

impl<V: Value> ValueSink<V> for ValueFanOut<V> {
    fn set(&self, value: V) -> Result<()> {
        let mut failures = Failures::default();
        for member in &self.members {
            failures.record(member.set(value));
        }
        failures.finish()
    }
}

impl EventOutput {
    /// Fan one trigger out to every output in `outputs`.
    pub fn combine<I>(outputs: I) -> EventOutput
    where
        I: IntoIterator<Item = EventOutput>,
    {
        let mut members: SmallVec<[EventOutput; 4]> = outputs.into_iter().collect();
        match members.len() {
            0 => EventOutput::ignored(),
            1 => members.remove(0),
            _ => EventOutput::new(EventFanOut { members }),
        }
    }
}

impl<V: Value> Output<V> {
    /// Fan one write out to every output in `outputs`.
    pub fn combine<I>(outputs: I) -> Output<V>
    where
        I: IntoIterator<Item = Output<V>>,
    {
        let mut members: SmallVec<[Output<V>; 4]> = outputs.into_iter().collect();
        match members.len() {
            0 => Output::ignored(),
            1 => members.remove(0),
            _ => Output::new(ValueFanOut { members }),
        }
    }
}
