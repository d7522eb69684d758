//! Expiration Timer
//!
//! A set of `(delay, output)` tasks armed together.
//!
//! # How Expiration Timers Work
//!
//! 1. Tasks are registered while the timer is stopped.
//!
//! 2. `start` arms every task relative to now. Each task fires once, when
//!    its delay has elapsed, unless the timer is fed or stopped first.
//!
//! 3. `feed` cancels every pending firing and re-arms all tasks from a fresh
//!    now. Dynamic delays are re-read at this point.
//!
//! 4. `stop` cancels every pending firing.
//!
//! The timer counts as running from `start` until `stop`, whether or not
//! every task has already fired. Start and stop are serialized with the
//! write to the running cell, so the cell settles on the same answer as
//! [`ExpirationTimer::is_running`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, ReentrantMutex};

use super::delay::Delay;
use super::scheduler::Scheduler;
use crate::channel::{
    BooleanCell, BooleanInput, BooleanOutput, Cancel, EventCell, EventInput, EventOutput,
    FloatInput, Output, Value,
};
use crate::error::{Error, Result};

struct State {
    tasks: Vec<(Delay, EventOutput)>,
    /// Pending firings. `Some` exactly while running.
    armed: Option<Vec<Cancel>>,
}

struct Inner {
    scheduler: Scheduler,
    name: String,
    state: Mutex<State>,
    /// Held across a start or stop and the running-cell write it causes.
    control: ReentrantMutex<()>,
    running: BooleanCell,
}

/// A restartable group of one-shot timeouts.
#[derive(Clone)]
pub struct ExpirationTimer {
    inner: Arc<Inner>,
}

impl Inner {
    fn arm(&self, tasks: &[(Delay, EventOutput)]) -> Vec<Cancel> {
        tasks
            .iter()
            .map(|(delay, output)| {
                self.scheduler
                    .schedule_after(&self.name, delay.resolve(), output.clone())
            })
            .collect()
    }

    fn start(&self) -> Result<()> {
        let _order = self.control.lock();
        {
            let mut state = self.state.lock();
            if state.armed.is_some() {
                return Err(Error::invalid_state(format!(
                    "expiration timer '{}' is already running",
                    self.name
                )));
            }
            let armed = self.arm(&state.tasks);
            state.armed = Some(armed);
        }
        self.running.set(true)
    }

    fn feed(&self) -> Result<()> {
        let mut state = self.state.lock();
        let Some(pending) = state.armed.take() else {
            return Err(Error::invalid_state(format!(
                "expiration timer '{}' is not running",
                self.name
            )));
        };
        for token in pending {
            token.cancel();
        }
        let armed = self.arm(&state.tasks);
        state.armed = Some(armed);
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        let _order = self.control.lock();
        {
            let mut state = self.state.lock();
            let Some(pending) = state.armed.take() else {
                return Err(Error::invalid_state(format!(
                    "expiration timer '{}' is not running",
                    self.name
                )));
            };
            for token in pending {
                token.cancel();
            }
        }
        self.running.set(false)
    }

    fn start_or_feed(&self) -> Result<()> {
        let _order = self.control.lock();
        if self.state.lock().armed.is_some() {
            self.feed()
        } else {
            self.start()
        }
    }

    /// Start or stop to match `run`. A no-op if already there.
    fn set_running(&self, run: bool) -> Result<()> {
        let _order = self.control.lock();
        let running = self.state.lock().armed.is_some();
        match (run, running) {
            (true, false) => self.start(),
            (false, true) => self.stop(),
            _ => Ok(()),
        }
    }
}

impl ExpirationTimer {
    /// A stopped timer with no tasks. `name` tags its scheduled firings.
    pub fn new(scheduler: &Scheduler, name: &str) -> Self {
        Self {
            inner: Arc::new(Inner {
                scheduler: scheduler.clone(),
                name: name.to_owned(),
                state: Mutex::new(State {
                    tasks: Vec::new(),
                    armed: None,
                }),
                control: ReentrantMutex::new(()),
                running: BooleanCell::new(false),
            }),
        }
    }

    fn add(&self, delay: Delay, output: EventOutput) -> Result<()> {
        let mut state = self.inner.state.lock();
        if state.armed.is_some() {
            return Err(Error::invalid_state(format!(
                "cannot schedule on expiration timer '{}' while it is running",
                self.inner.name
            )));
        }
        state.tasks.push((delay, output));
        Ok(())
    }

    /// Fire `output` once `delay` after each start or feed.
    pub fn schedule(&self, delay: Duration, output: &EventOutput) -> Result<()> {
        self.add(Delay::Fixed(delay), output.clone())
    }

    /// Like [`schedule`](Self::schedule) with the delay, in seconds, read
    /// from `seconds` each time the timer is armed.
    pub fn schedule_dynamic(&self, seconds: &FloatInput, output: &EventOutput) -> Result<()> {
        self.add(Delay::dynamic(seconds), output.clone())
    }

    /// An event that fires `delay` after each start or feed.
    pub fn schedule_event(&self, delay: Duration) -> Result<EventInput> {
        let events = EventCell::new();
        self.schedule(delay, &events.as_output())?;
        Ok(events.as_input())
    }

    /// Write `value` into `output` `delay` after each start or feed.
    pub fn schedule_set<V: Value>(&self, delay: Duration, output: &Output<V>, value: V) -> Result<()> {
        self.schedule(delay, &output.set_event(value))
    }

    /// Hold `output` at `during` from `start` until `end` after each start or
    /// feed, writing the opposite value at `end`.
    pub fn schedule_boolean_period(
        &self,
        start: Duration,
        end: Duration,
        output: &BooleanOutput,
        during: bool,
    ) -> Result<()> {
        if end < start {
            return Err(Error::invalid_argument(format!(
                "boolean period ends ({end:?}) before it starts ({start:?})"
            )));
        }
        self.schedule_set(start, output, during)?;
        self.schedule_set(end, output, !during)
    }

    /// Arm every task. Fails if already running.
    pub fn start(&self) -> Result<()> {
        self.inner.start()
    }

    /// Re-arm every task from now. Fails if not running.
    pub fn feed(&self) -> Result<()> {
        self.inner.feed()
    }

    /// Cancel pending firings. Fails if not running.
    pub fn stop(&self) -> Result<()> {
        self.inner.stop()
    }

    /// Feed if running, otherwise start.
    pub fn start_or_feed(&self) -> Result<()> {
        self.inner.start_or_feed()
    }

    pub fn start_when(&self, event: &EventInput) -> Cancel {
        let inner = Arc::clone(&self.inner);
        event.subscribe(EventOutput::from_fn(move || inner.start()))
    }

    pub fn feed_when(&self, event: &EventInput) -> Cancel {
        let inner = Arc::clone(&self.inner);
        event.subscribe(EventOutput::from_fn(move || inner.feed()))
    }

    pub fn stop_when(&self, event: &EventInput) -> Cancel {
        let inner = Arc::clone(&self.inner);
        event.subscribe(EventOutput::from_fn(move || inner.stop()))
    }

    pub fn start_or_feed_when(&self, event: &EventInput) -> Cancel {
        let inner = Arc::clone(&self.inner);
        event.subscribe(EventOutput::from_fn(move || inner.start_or_feed()))
    }

    /// Run exactly while `condition` is true: start on rising, stop on
    /// falling. Starts immediately if `condition` is already true.
    pub fn run_when(&self, condition: &BooleanInput) -> Result<Cancel> {
        if condition.get() {
            self.inner.set_running(true)?;
        }
        let inner = Arc::clone(&self.inner);
        let value = condition.sampler();
        Ok(condition.on_update(EventOutput::from_fn(move || {
            inner.set_running(value.get())
        })))
    }

    /// True from start until stop.
    pub fn running(&self) -> BooleanInput {
        self.inner.running.as_input()
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.lock().armed.is_some()
    }
}

impl fmt::Debug for ExpirationTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("ExpirationTimer")
            .field("name", &self.inner.name)
            .field("tasks", &state.tasks.len())
            .field("running", &state.armed.is_some())
            .finish()
    }
}
