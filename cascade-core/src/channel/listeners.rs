//! Listener Registry
//!
//! The ordered list of listeners owned by every cell, derived source and
//! event cell.
//!
//! # Mutation During Delivery
//!
//! A notification pass works on a snapshot of the list taken under a short
//! lock, which is released before any listener runs. Each entry carries a
//! presence flag that its cancellation token clears, so:
//!
//! - a listener removed mid-pass is not invoked afterwards, and the others
//!   are neither skipped nor invoked twice
//! - a listener added mid-pass is not part of the snapshot and first runs on
//!   the next pass
//!
//! Listeners are therefore free to subscribe or cancel (themselves or
//! others) from inside their own notification.
//!
//! # Ownership
//!
//! The registry owns its listeners. Cancellation tokens hold only a weak
//! reference back to the registry, so outstanding tokens never keep a
//! source alive.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;

use super::cancel::Cancel;
use super::event::{EventOutput, EventSource};
use crate::error::Result;
use crate::propagation::Failures;

/// Unique identifier for a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Generate a new unique listener ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

struct Entry {
    id: ListenerId,
    listener: EventOutput,
    present: Arc<AtomicBool>,
}

type Entries = Mutex<Vec<Entry>>;

/// Ordered, mutation-tolerant collection of listeners.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    entries: Arc<Entries>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `listener` and return the token that removes it.
    pub fn subscribe(&self, listener: EventOutput) -> Cancel {
        let id = ListenerId::new();
        let present = Arc::new(AtomicBool::new(true));

        self.entries.lock().push(Entry {
            id,
            listener,
            present: Arc::clone(&present),
        });

        let entries: Weak<Entries> = Arc::downgrade(&self.entries);
        Cancel::new(move || {
            present.store(false, Ordering::Release);
            if let Some(entries) = entries.upgrade() {
                entries.lock().retain(|entry| entry.id != id);
            }
        })
    }

    /// Deliver one notification to every listener present in the snapshot.
    ///
    /// Every listener runs even if an earlier one failed. Failures are
    /// aggregated with the first as primary.
    pub fn notify(&self) -> Result<()> {
        let snapshot: SmallVec<[(EventOutput, Arc<AtomicBool>); 4]> = self
            .entries
            .lock()
            .iter()
            .map(|entry| (entry.listener.clone(), Arc::clone(&entry.present)))
            .collect();

        let mut failures = Failures::default();
        for (listener, present) in snapshot {
            if present.load(Ordering::Acquire) {
                failures.record(listener.event());
            }
        }
        failures.finish()
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSource for ListenerRegistry {
    fn subscribe(&self, listener: EventOutput) -> Cancel {
        ListenerRegistry::subscribe(self, listener)
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("len", &self.len())
            .finish()
    }
}
