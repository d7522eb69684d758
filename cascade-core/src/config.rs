//! Runtime Configuration
//!
//! Timing knobs for the scheduler and the timers built on it. Every field
//! has a default, so a configuration document only needs to name what it
//! overrides:
//!
//! ```json
//! { "scheduler": { "max_catch_up": 3 } }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Scheduler tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Most overdue firings a fixed-rate task may replay back-to-back.
    /// Firings beyond this are dropped and the task realigns to its grid.
    pub max_catch_up: u32,

    /// Sampling period of stopwatch timers, in milliseconds.
    pub stopwatch_sample_period_ms: u64,

    /// How long the real-time driver sleeps when no task is queued, in
    /// milliseconds. A newly scheduled task wakes it early.
    pub driver_idle_wait_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_catch_up: 5,
            stopwatch_sample_period_ms: 10,
            driver_idle_wait_ms: 100,
        }
    }
}

impl SchedulerConfig {
    /// Check that every field is usable.
    pub fn validate(&self) -> Result<()> {
        if self.max_catch_up == 0 {
            return Err(Error::invalid_argument("max_catch_up must be at least 1"));
        }
        if self.stopwatch_sample_period_ms == 0 {
            return Err(Error::invalid_argument(
                "stopwatch_sample_period_ms must be positive",
            ));
        }
        if self.driver_idle_wait_ms == 0 {
            return Err(Error::invalid_argument("driver_idle_wait_ms must be positive"));
        }
        Ok(())
    }

    pub fn stopwatch_sample_period(&self) -> Duration {
        Duration::from_millis(self.stopwatch_sample_period_ms)
    }

    pub fn driver_idle_wait(&self) -> Duration {
        Duration::from_millis(self.driver_idle_wait_ms)
    }
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub scheduler: SchedulerConfig,
}

impl RuntimeConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json(document: &str) -> Result<Self> {
        let config: RuntimeConfig = serde_json::from_str(document)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.scheduler.validate()
    }
}
