//! Channel Type Family
//!
//! Every value kind (boolean, float, event) comes with the same set of
//! roles:
//!
//! - [`Input`] / [`EventInput`]: read and subscribe.
//! - [`Output`] / [`EventOutput`]: write or trigger.
//! - [`Cell`] / [`EventCell`]: both, over one exclusively owned slot.
//! - Derived sources: an [`Input`] computed from upstream inputs and cached
//!   between notifications (see [`Input::derived`], [`Input::map`]).
//!
//! Subscriptions return a [`Cancel`] token. Upstreams own their listeners;
//! downstreams hold only tokens, so dropping the root of a chain frees the
//! whole chain.

mod cancel;
mod cell;
mod derived;
mod event;
mod input;
mod listeners;
mod output;
mod value;

pub use cancel::Cancel;
pub use cell::{BooleanCell, Cell, FloatCell};
pub use event::{EventCell, EventInput, EventOutput, EventSink, EventSource};
pub use input::{BooleanInput, FloatInput, Input, Sampler};
pub use listeners::{ListenerId, ListenerRegistry};
pub use output::{BooleanOutput, FloatOutput, Output, ValueSink};
pub use value::{Value, ValueSource};
