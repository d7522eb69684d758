//! Ticker
//!
//! A periodic event source that arms itself lazily: nothing is scheduled
//! until the first listener subscribes. A ticker is either periodic (next
//! tick measured from the end of the previous one) or fixed-rate (ticks
//! stay on a grid and catch up after overruns).
//!
//! Once terminated, a ticker never ticks again and refuses new listeners.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::scheduler::Scheduler;
use crate::channel::{Cancel, EventCell, EventInput, EventOutput, EventSource};
use crate::error::{Error, Result};
use crate::logging::{self, Severity};

#[derive(Default)]
struct State {
    armed: Option<Cancel>,
    terminated: bool,
}

struct Inner {
    scheduler: Scheduler,
    tag: String,
    period: Duration,
    fixed_rate: bool,
    ticks: EventCell,
    state: Mutex<State>,
}

impl Inner {
    fn on_tick(&self, listener: EventOutput) -> Result<Cancel> {
        let mut state = self.state.lock();
        if state.terminated {
            return Err(Error::invalid_state(format!(
                "ticker '{}' has been terminated",
                self.tag
            )));
        }
        let token = self.ticks.on_event(listener);
        if state.armed.is_none() {
            let target = self.ticks.as_output();
            let armed = if self.fixed_rate {
                self.scheduler
                    .schedule_fixed_rate(&self.tag, self.period, target)?
            } else {
                self.scheduler
                    .schedule_periodic(&self.tag, self.period, target)?
            };
            state.armed = Some(armed);
        }
        Ok(token)
    }
}

/// A lazily armed periodic event source.
#[derive(Clone)]
pub struct Ticker {
    inner: Arc<Inner>,
}

impl Ticker {
    /// A ticker firing every `period`. With `fixed_rate`, missed ticks are
    /// caught up rather than skipped.
    pub fn new(scheduler: &Scheduler, period: Duration, fixed_rate: bool) -> Result<Self> {
        Self::with_tag(scheduler, "ticker", period, fixed_rate)
    }

    /// Like [`new`](Self::new), tagging scheduled ticks with `tag`.
    pub fn with_tag(
        scheduler: &Scheduler,
        tag: &str,
        period: Duration,
        fixed_rate: bool,
    ) -> Result<Self> {
        if period.is_zero() {
            return Err(Error::invalid_argument("ticker period must be positive"));
        }
        Ok(Self {
            inner: Arc::new(Inner {
                scheduler: scheduler.clone(),
                tag: tag.to_owned(),
                period,
                fixed_rate,
                ticks: EventCell::new(),
                state: Mutex::new(State::default()),
            }),
        })
    }

    /// Register `listener` for every tick, arming the ticker if needed.
    pub fn on_tick(&self, listener: EventOutput) -> Result<Cancel> {
        self.inner.on_tick(listener)
    }

    /// The ticks as an event input.
    pub fn events(&self) -> Result<EventInput> {
        if self.is_terminated() {
            return Err(Error::invalid_state(format!(
                "ticker '{}' has been terminated",
                self.inner.tag
            )));
        }
        Ok(EventInput::new(TickEvents {
            inner: Arc::clone(&self.inner),
        }))
    }

    /// Stop ticking for good.
    pub fn terminate(&self) {
        let mut state = self.inner.state.lock();
        state.terminated = true;
        if let Some(armed) = state.armed.take() {
            armed.cancel();
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.inner.state.lock().terminated
    }

    pub fn is_armed(&self) -> bool {
        self.inner.state.lock().armed.is_some()
    }

    pub fn period(&self) -> Duration {
        self.inner.period
    }
}

impl fmt::Debug for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ticker")
            .field("tag", &self.inner.tag)
            .field("period", &self.inner.period)
            .field("fixed_rate", &self.inner.fixed_rate)
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

/// Event-input view of a ticker. Subscribing after termination cannot
/// report an error through [`EventSource`], so it is logged and the
/// returned token does nothing.
struct TickEvents {
    inner: Arc<Inner>,
}

impl EventSource for TickEvents {
    fn subscribe(&self, listener: EventOutput) -> Cancel {
        match self.inner.on_tick(listener) {
            Ok(token) => token,
            Err(err) => {
                logging::log(Severity::Warning, "Ticker subscription refused", Some(&err));
                Cancel::noop()
            }
        }
    }
}
