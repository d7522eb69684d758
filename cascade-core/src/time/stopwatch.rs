//! Stopwatch Timer
//!
//! Reports elapsed seconds since the last reset. A background periodic task
//! samples the clock every [`SchedulerConfig::stopwatch_sample_period_ms`]
//! and publishes the result to a float cell. The task holds the stopwatch
//! weakly and is cancelled when the last handle is dropped.
//!
//! [`SchedulerConfig::stopwatch_sample_period_ms`]: crate::config::SchedulerConfig::stopwatch_sample_period_ms

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::clock::SharedClock;
use super::scheduler::Scheduler;
use crate::channel::{Cancel, EventInput, EventOutput, FloatCell, FloatInput};
use crate::error::Result;

struct Inner {
    clock: SharedClock,
    /// Clock reading at the last reset.
    reset_at: AtomicU64,
    elapsed: FloatCell,
    sampler: Mutex<Option<Cancel>>,
}

impl Inner {
    fn seconds(&self) -> f32 {
        let since = self
            .clock
            .now_nanos()
            .saturating_sub(self.reset_at.load(Ordering::Acquire));
        (since as f64 / 1e9) as f32
    }

    fn sample(&self) -> Result<()> {
        self.elapsed.set(self.seconds())
    }

    fn reset(&self) -> Result<()> {
        self.reset_at.store(self.clock.now_nanos(), Ordering::Release);
        self.elapsed.set(0.0)
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(token) = self.sampler.get_mut().take() {
            token.cancel();
        }
    }
}

/// Elapsed time since the last reset, in seconds.
#[derive(Clone)]
pub struct StopwatchTimer {
    inner: Arc<Inner>,
}

impl StopwatchTimer {
    /// Start a stopwatch sampled by `scheduler`.
    pub fn new(scheduler: &Scheduler) -> Result<Self> {
        let clock = scheduler.clock().clone();
        let inner = Arc::new(Inner {
            reset_at: AtomicU64::new(clock.now_nanos()),
            clock,
            elapsed: FloatCell::new(0.0),
            sampler: Mutex::new(None),
        });

        let sampling: Weak<Inner> = Arc::downgrade(&inner);
        let token = scheduler.schedule_periodic(
            "stopwatch",
            scheduler.config().stopwatch_sample_period(),
            EventOutput::from_fn(move || match sampling.upgrade() {
                Some(inner) => inner.sample(),
                None => Ok(()),
            }),
        )?;
        *inner.sampler.lock() = Some(token);
        Ok(Self { inner })
    }

    /// Elapsed seconds, as of the last sample.
    pub fn elapsed(&self) -> FloatInput {
        self.inner.elapsed.as_input()
    }

    /// Elapsed seconds, read from the clock now.
    pub fn elapsed_now(&self) -> f32 {
        self.inner.seconds()
    }

    /// Restart from zero.
    pub fn reset(&self) -> Result<()> {
        self.inner.reset()
    }

    /// Restart from zero every time `event` fires.
    pub fn reset_when(&self, event: &EventInput) -> Cancel {
        let inner = Arc::clone(&self.inner);
        event.subscribe(EventOutput::from_fn(move || inner.reset()))
    }

    /// Stop sampling. The elapsed input keeps its last value.
    pub fn stop(&self) {
        if let Some(token) = self.inner.sampler.lock().take() {
            token.cancel();
        }
    }
}

impl fmt::Debug for StopwatchTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopwatchTimer")
            .field("elapsed", &self.inner.elapsed.get())
            .field("sampling", &self.inner.sampler.lock().is_some())
            .finish()
    }
}
