//! Cell Implementation
//!
//! A Cell is the canonical mutable channel: it holds a current value, the
//! listeners interested in it, and the change-detection state.
//!
//! # How Cells Work
//!
//! 1. `set` stores the new value. `get` always reflects the latest write.
//!
//! 2. If the new value is not [`Value::same`] as the previous one, every
//!    listener is notified. Writing an unchanged value is a no-op for
//!    subscribers.
//!
//! 3. Listeners receive no payload; they read the cell (or anything derived
//!    from it) during notification.
//!
//! # Thread Safety
//!
//! Writes are serialized by a per-cell delivery lock held across the store
//! and the notification pass, so every subscriber observes the same total
//! order of changes. The lock is reentrant: a listener may write back into
//! the cell it is being notified by. Listener-list mutation uses a separate
//! short lock and never blocks on delivery.
//!
//! # Memory Layout
//!
//! Each cell consists of:
//! - A unique ID (8 bytes)
//! - The value slot, shared with readers
//! - The listener registry
//! - The delivery lock

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::ReentrantMutex;

use super::cancel::Cancel;
use super::event::{EventInput, EventOutput};
use super::input::Input;
use super::listeners::ListenerRegistry;
use super::output::{Output, ValueSink};
use super::value::{Slot, Value, ValueSource};
use crate::error::Result;
use crate::logging;

/// Counter for generating unique cell IDs.
static CELL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique cell ID.
fn next_cell_id() -> u64 {
    CELL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// A mutable channel holding a value of type `V`.
///
/// # Example
///
/// ```rust
/// use cascade_core::channel::FloatCell;
///
/// let speed = FloatCell::new(0.0);
/// speed.set(0.5).unwrap();
/// assert_eq!(speed.get(), 0.5);
/// ```
pub struct Cell<V: Value> {
    /// Unique identifier for this cell.
    id: u64,

    /// The current value, shared with every reader.
    slot: Arc<Slot<V>>,

    /// Listeners notified on change.
    listeners: ListenerRegistry,

    /// Serializes store-and-notify across threads.
    delivery: Arc<ReentrantMutex<()>>,
}

/// A cell of booleans.
pub type BooleanCell = Cell<bool>;

/// A cell of floats.
pub type FloatCell = Cell<f32>;

impl<V: Value> Cell<V> {
    /// Create a new cell with the given initial value.
    pub fn new(value: V) -> Self {
        Self {
            id: next_cell_id(),
            slot: Arc::new(Slot::new(value)),
            listeners: ListenerRegistry::new(),
            delivery: Arc::new(ReentrantMutex::new(())),
        }
    }

    /// Get the cell's unique ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get the current value.
    pub fn get(&self) -> V {
        self.slot.get()
    }

    /// Raw write: store `value` and notify on change. A listener failure is
    /// returned after every listener has run.
    pub fn set(&self, value: V) -> Result<()> {
        let _order = self.delivery.lock();
        if self.slot.replace(value) {
            self.listeners.notify()
        } else {
            Ok(())
        }
    }

    /// Safe write: failures are logged and swallowed.
    pub fn safe_set(&self, value: V) {
        if let Err(err) = self.set(value) {
            logging::propagation_failure(&value, &err);
        }
    }

    /// Register `listener` to run after every change.
    pub fn on_update(&self, listener: EventOutput) -> Cancel {
        self.listeners.subscribe(listener)
    }

    /// Read-only view of this cell.
    pub fn as_input(&self) -> Input<V> {
        Input::from_parts(
            Arc::clone(&self.slot) as Arc<dyn ValueSource<V>>,
            EventInput::new(self.listeners.clone()),
        )
    }

    /// Write-only view of this cell.
    pub fn as_output(&self) -> Output<V> {
        Output::new(self.clone())
    }

    /// An event output that writes `value` into this cell.
    pub fn set_event(&self, value: V) -> EventOutput {
        let cell = self.clone();
        EventOutput::from_fn(move || cell.set(value))
    }

    /// Get the number of listeners.
    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Cell<bool> {
    /// Invert the stored value.
    pub fn toggle(&self) -> Result<()> {
        let _order = self.delivery.lock();
        self.set(!self.get())
    }

    /// Invert the stored value every time `event` fires.
    pub fn toggle_when(&self, event: &EventInput) -> Cancel {
        let cell = self.clone();
        event.subscribe(EventOutput::from_fn(move || cell.toggle()))
    }
}

impl<V: Value + Default> Default for Cell<V> {
    fn default() -> Self {
        Self::new(V::default())
    }
}

impl<V: Value> ValueSink<V> for Cell<V> {
    fn set(&self, value: V) -> Result<()> {
        Cell::set(self, value)
    }
}

impl<V: Value> Clone for Cell<V> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            slot: Arc::clone(&self.slot),
            listeners: self.listeners.clone(),
            delivery: Arc::clone(&self.delivery),
        }
    }
}

impl<V: Value> fmt::Debug for Cell<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell")
            .field("id", &self.id)
            .field("value", &self.get())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
