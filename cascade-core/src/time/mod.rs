//! Scheduler & Timers
//!
//! Time enters the runtime through two explicit objects:
//!
//! - a [`Clock`], shared by everything that measures time
//! - a [`Scheduler`], which owns timed tasks and is passed to every timer
//!
//! There is no global scheduler. Tests build one over a [`VirtualClock`] and
//! drive it by hand with [`Scheduler::run_pending`]; applications hand it to
//! [`Scheduler::spawn_driver`] on a tokio runtime.

mod clock;
mod delay;
mod driver;
mod expiration;
mod pause;
mod scheduler;
mod stopwatch;
mod ticker;

pub use clock::{Clock, SharedClock, SystemClock, VirtualClock};
pub use driver::Driver;
pub use expiration::ExpirationTimer;
pub use pause::PauseTimer;
pub use scheduler::Scheduler;
pub use stopwatch::StopwatchTimer;
pub use ticker::Ticker;
