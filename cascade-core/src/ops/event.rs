//! Event combinators: merging, conditional forwarding and debounce.
//!
//! # How Debounce Works
//!
//! The first trigger fires through immediately and opens a window of the
//! configured length. Triggers inside the window are dropped. The first
//! trigger at or after the window end fires and opens the next window, so
//! windows are half-open: `[fire, fire + duration)`.

use std::time::Duration;

use parking_lot::Mutex;

use crate::channel::{
    BooleanInput, Cancel, EventCell, EventInput, EventOutput, EventSink, EventSource, Sampler,
};
use crate::error::{Error, Result};
use crate::time::SharedClock;

/// Subscribes every listener to both halves.
struct Either {
    left: EventInput,
    right: EventInput,
}

impl EventSource for Either {
    fn subscribe(&self, listener: EventOutput) -> Cancel {
        Cancel::all([
            self.left.subscribe(listener.clone()),
            self.right.subscribe(listener),
        ])
    }
}

/// Forwards upstream events only while the condition reads `expected`.
struct Conditional {
    upstream: EventInput,
    condition: Sampler<bool>,
    expected: bool,
}

impl EventSource for Conditional {
    fn subscribe(&self, listener: EventOutput) -> Cancel {
        let condition = self.condition.clone();
        let expected = self.expected;
        self.upstream.subscribe(EventOutput::from_fn(move || {
            if condition.get() == expected {
                listener.event()
            } else {
                Ok(())
            }
        }))
    }
}

struct Debounce {
    target: EventOutput,
    clock: SharedClock,
    window: u64,
    /// End of the open window, in clock nanoseconds.
    window_end: Mutex<Option<u64>>,
}

impl EventSink for Debounce {
    fn event(&self) -> Result<()> {
        let now = self.clock.now_nanos();
        {
            let mut window_end = self.window_end.lock();
            if matches!(*window_end, Some(end) if now < end) {
                return Ok(());
            }
            *window_end = Some(now.saturating_add(self.window));
        }
        self.target.event()
    }
}

fn window_nanos(duration: Duration) -> Result<u64> {
    let nanos = u64::try_from(duration.as_nanos())
        .map_err(|_| Error::invalid_argument("debounce window does not fit in u64 nanoseconds"))?;
    if nanos == 0 {
        return Err(Error::invalid_argument("debounce window must be positive"));
    }
    Ok(nanos)
}

impl EventInput {
    /// Fires whenever either input fires.
    pub fn or(&self, other: &EventInput) -> EventInput {
        EventInput::new(Either {
            left: self.clone(),
            right: other.clone(),
        })
    }

    /// Forward events only while `condition` is true.
    pub fn only_if(&self, condition: &BooleanInput) -> EventInput {
        self.conditional(condition, true)
    }

    /// Forward events only while `condition` is false.
    pub fn only_if_not(&self, condition: &BooleanInput) -> EventInput {
        self.conditional(condition, false)
    }

    /// A debounced view of this input. See the module docs.
    pub fn debounced(&self, clock: &SharedClock, window: Duration) -> Result<EventInput> {
        let events = EventCell::new();
        let gate = events.as_output().debounce(clock, window)?;
        self.subscribe(gate);
        Ok(events.as_input())
    }

    fn conditional(&self, condition: &BooleanInput, expected: bool) -> EventInput {
        EventInput::new(Conditional {
            upstream: self.clone(),
            condition: condition.sampler(),
            expected,
        })
    }
}

impl EventOutput {
    /// An output that forwards here at most once per `window`.
    pub fn debounce(&self, clock: &SharedClock, window: Duration) -> Result<EventOutput> {
        Ok(EventOutput::new(Debounce {
            target: self.clone(),
            clock: clock.clone(),
            window: window_nanos(window)?,
            window_end: Mutex::new(None),
        }))
    }
}
