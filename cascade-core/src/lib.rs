//! Cascade Core
//!
//! This crate provides the reactive signal and event runtime for a real-time
//! control loop. Producers (sensors, operator inputs, timers) and consumers
//! (actuators, logic blocks) are wired together as typed channels; values
//! and events propagate push-style through combinator chains, with explicit,
//! revocable subscriptions.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `channel`: cells, derived sources, input/output handles, events,
//!   listener registries and cancellation tokens
//! - `ops`: the combinator algebra (logic, arithmetic, gates, debounce,
//!   ramping, deadzone, range, derivative, normalize)
//! - `propagation`: fan-out and failure aggregation
//! - `time`: clocks, the tagged scheduler, its tokio driver and timers
//! - `state_machine`: named states with enter/exit hooks
//! - `error`, `config`, `logging`: the ambient stack
//!
//! # Example
//!
//! ```rust
//! use cascade_core::channel::{BooleanCell, FloatCell};
//!
//! // Leaf cells, fed by drivers.
//! let joystick = FloatCell::new(0.0);
//! let enabled = BooleanCell::new(false);
//!
//! // A derived command: deadzoned, and zero while disabled.
//! let command = enabled
//!     .as_input()
//!     .select(&0.0.into(), &joystick.as_input().deadzone(0.1).unwrap());
//!
//! // The actuator.
//! let motor = FloatCell::new(0.0);
//! command.send(&motor.as_output()).unwrap();
//!
//! joystick.set(0.6).unwrap();
//! assert_eq!(motor.get(), 0.0);
//!
//! enabled.set(true).unwrap();
//! assert_eq!(motor.get(), 0.6);
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod logging;
pub mod ops;
pub mod propagation;
pub mod state_machine;
pub mod time;

pub use channel::{
    BooleanCell, BooleanInput, BooleanOutput, Cancel, Cell, EventCell, EventInput, EventOutput,
    FloatCell, FloatInput, FloatOutput, Input, Output,
};
pub use config::{RuntimeConfig, SchedulerConfig};
pub use error::{Error, Result};
pub use state_machine::StateMachine;
pub use time::{Scheduler, SharedClock, SystemClock, VirtualClock};
