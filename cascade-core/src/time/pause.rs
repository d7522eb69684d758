//! Pause Timer
//!
//! A retriggerable timeout. Each trigger opens the window if it is closed,
//! or restarts it if it is open. The window closes once the timeout elapses
//! with no further trigger.
//!
//! Each arming carries a generation number. An expiry from an earlier
//! arming that was already dispatching when the timer was retriggered finds
//! a newer generation and does nothing.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::delay::Delay;
use super::scheduler::Scheduler;
use crate::channel::{
    BooleanCell, BooleanInput, Cancel, EventCell, EventOutput, EventSink, FloatInput,
};
use crate::error::{Error, Result};
use crate::propagation::Failures;

#[derive(Default)]
struct State {
    generation: u64,
    pending: Option<Cancel>,
}

struct Inner {
    scheduler: Scheduler,
    tag: String,
    timeout: Delay,
    state: Mutex<State>,
    running: BooleanCell,
    started: EventCell,
    ended: EventCell,
}

impl Inner {
    fn trigger(self: &Arc<Self>) -> Result<()> {
        let opened = {
            let mut state = self.state.lock();
            state.generation += 1;
            let generation = state.generation;
            let opened = state.pending.is_none();
            if let Some(pending) = state.pending.take() {
                pending.cancel();
            }

            let inner = Arc::clone(self);
            state.pending = Some(self.scheduler.schedule_after(
                &self.tag,
                self.timeout.resolve(),
                EventOutput::from_fn(move || inner.expire(generation)),
            ));
            opened
        };

        if !opened {
            return Ok(());
        }
        let mut failures = Failures::default();
        failures.record(self.running.set(true));
        failures.record(self.started.event());
        failures.finish()
    }

    fn expire(&self, generation: u64) -> Result<()> {
        {
            let mut state = self.state.lock();
            if state.generation != generation {
                return Ok(());
            }
            state.pending = None;
        }
        let mut failures = Failures::default();
        failures.record(self.running.set(false));
        failures.record(self.ended.event());
        failures.finish()
    }
}

/// A retriggerable timeout window.
#[derive(Clone)]
pub struct PauseTimer {
    inner: Arc<Inner>,
}

impl PauseTimer {
    /// A timer whose window lasts `timeout`.
    pub fn new(scheduler: &Scheduler, tag: &str, timeout: Duration) -> Result<Self> {
        if timeout.is_zero() {
            return Err(Error::invalid_argument("pause timeout must be positive"));
        }
        Ok(Self::build(scheduler, tag, Delay::Fixed(timeout)))
    }

    /// A timer whose window length, in seconds, is read from `seconds` at
    /// each trigger.
    pub fn with_dynamic_timeout(scheduler: &Scheduler, tag: &str, seconds: &FloatInput) -> Self {
        Self::build(scheduler, tag, Delay::dynamic(seconds))
    }

    fn build(scheduler: &Scheduler, tag: &str, timeout: Delay) -> Self {
        Self {
            inner: Arc::new(Inner {
                scheduler: scheduler.clone(),
                tag: tag.to_owned(),
                timeout,
                state: Mutex::new(State::default()),
                running: BooleanCell::new(false),
                started: EventCell::new(),
                ended: EventCell::new(),
            }),
        }
    }

    /// Open or restart the window.
    pub fn event(&self) -> Result<()> {
        self.inner.trigger()
    }

    /// This timer as a trigger.
    pub fn as_output(&self) -> EventOutput {
        EventOutput::new(self.clone())
    }

    /// True while the window is open.
    pub fn running(&self) -> BooleanInput {
        self.inner.running.as_input()
    }

    /// Fire `output` whenever the window opens.
    pub fn trigger_at_start(&self, output: &EventOutput) -> Cancel {
        self.inner.started.on_event(output.clone())
    }

    /// Fire `output` whenever the window closes.
    pub fn trigger_at_end(&self, output: &EventOutput) -> Cancel {
        self.inner.ended.on_event(output.clone())
    }

    /// Both of the above.
    pub fn trigger_at_changes(&self, start: &EventOutput, end: &EventOutput) -> Cancel {
        Cancel::all([self.trigger_at_start(start), self.trigger_at_end(end)])
    }
}

impl EventSink for PauseTimer {
    fn event(&self) -> Result<()> {
        self.inner.trigger()
    }
}

impl fmt::Debug for PauseTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PauseTimer")
            .field("tag", &self.inner.tag)
            .field("timeout", &self.inner.timeout)
            .field("running", &self.inner.running.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::FloatCell;
    use crate::time::VirtualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter(count: &Arc<AtomicUsize>) -> EventOutput {
        let count = count.clone();
        EventOutput::from_fn(move || {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn advance(clock: &VirtualClock, scheduler: &Scheduler, millis: u64) {
        clock.advance(Duration::from_millis(millis));
        scheduler.run_pending();
    }

    #[test]
    fn retrigger_extends_the_window() {
        let clock = VirtualClock::new();
        let scheduler = Scheduler::new(clock.shared());
        let timer = PauseTimer::new(&scheduler, "pause", Duration::from_millis(100)).unwrap();
        let starts = Arc::new(AtomicUsize::new(0));
        let ends = Arc::new(AtomicUsize::new(0));
        timer.trigger_at_changes(&counter(&starts), &counter(&ends));

        timer.event().unwrap();
        assert!(timer.running().get());
        advance(&clock, &scheduler, 60);
        timer.event().unwrap();
        advance(&clock, &scheduler, 60);
        assert!(timer.running().get());
        assert_eq!(ends.load(Ordering::SeqCst), 0);

        advance(&clock, &scheduler, 40);
        assert!(!timer.running().get());
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert_eq!(ends.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.task_count(), 0);
    }

    #[test]
    fn stale_expiry_is_ignored() {
        let clock = VirtualClock::new();
        let scheduler = Scheduler::new(clock.shared());
        let timer = PauseTimer::new(&scheduler, "pause", Duration::from_millis(10)).unwrap();

        timer.event().unwrap();
        timer.inner.expire(0).unwrap();
        assert!(timer.running().get());
    }

    #[test]
    fn dynamic_timeout_and_validation() {
        let clock = VirtualClock::new();
        let scheduler = Scheduler::new(clock.shared());
        assert!(PauseTimer::new(&scheduler, "bad", Duration::ZERO).is_err());

        let seconds = FloatCell::new(0.05);
        let timer = PauseTimer::with_dynamic_timeout(&scheduler, "dyn", &seconds.as_input());
        timer.as_output().event().unwrap();
        advance(&clock, &scheduler, 49);
        assert!(timer.running().get());
        advance(&clock, &scheduler, 2);
        assert!(!timer.running().get());
    }
}
