//! Combinator Algebra
//!
//! Every combinator is an inherent method on the channel handle it applies
//! to, so chains read left to right:
//!
//! ```rust
//! use cascade_core::channel::{BooleanCell, FloatCell};
//!
//! let throttle = FloatCell::new(0.02);
//! let enabled = BooleanCell::new(true);
//!
//! let command = throttle
//!     .as_input()
//!     .deadzone(0.05)
//!     .unwrap()
//!     .filter_updates(&enabled.as_input());
//! assert_eq!(command.get(), 0.0);
//! ```
//!
//! - `boolean`: logic, edges, polarized dispatch
//! - `float`: arithmetic, predicates, deadzone, normalize, ramping,
//!   derivative
//! - `event`: merging, conditional forwarding, debounce
//! - `gate`: update and write gates

pub(crate) mod boolean;
mod event;
mod float;
mod gate;
