//! Time sources.
//!
//! Everything time-based in the runtime (debounce, derivative, the scheduler
//! and its timers) reads a [`Clock`] handed to it explicitly. Production
//! code uses [`SystemClock`]; tests use a [`VirtualClock`] that only moves
//! when told to.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A monotonic nanosecond time source.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Nanoseconds since an arbitrary fixed origin. Never decreases.
    fn now_nanos(&self) -> u64;

    fn now_seconds(&self) -> f64 {
        self.now_nanos() as f64 / 1e9
    }
}

/// A clock shared between the scheduler and the combinators it drives.
pub type SharedClock = Arc<dyn Clock>;

/// Wall-time monotonic clock, measured from its own construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn shared() -> SharedClock {
        Arc::new(Self::new())
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_nanos(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }
}

/// A clock that advances only when told to. Clones share the same time.
#[derive(Clone, Default)]
pub struct VirtualClock {
    now: Arc<AtomicU64>,
}

impl VirtualClock {
    /// A virtual clock starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward by `by`.
    pub fn advance(&self, by: Duration) {
        let nanos = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        self.now.fetch_add(nanos, Ordering::SeqCst);
    }

    /// Jump to `nanos`. Moving backwards is ignored.
    pub fn set_nanos(&self, nanos: u64) {
        self.now.fetch_max(nanos, Ordering::SeqCst);
    }

    /// This clock as a [`SharedClock`].
    pub fn shared(&self) -> SharedClock {
        Arc::new(self.clone())
    }
}

impl Clock for VirtualClock {
    fn now_nanos(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for VirtualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualClock")
            .field("now_nanos", &self.now_nanos())
            .finish()
    }
}
