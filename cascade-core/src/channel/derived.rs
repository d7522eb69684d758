//! Derived Sources
//!
//! A derived source is a cached value computed from zero or more upstream
//! sources.
//!
//! # How Derived Sources Work
//!
//! 1. On construction the value is computed once and cached, and a single
//!    recompute listener is registered with every distinct upstream.
//!
//! 2. Each upstream notification triggers exactly one recomputation, however
//!    many upstreams the source has.
//!
//! 3. If the result differs from the cache (bit-exact, as for cells), the
//!    cache is replaced and the source's own listeners are notified.
//!
//! 4. `get` returns the cache. Reading a derived source never recomputes.
//!
//! # Ownership
//!
//! The recompute listener lives in the upstream registries and owns the
//! cache and the downstream registry. The compute closure must reach its
//! upstreams through [`Sampler`]s only, never through full [`Input`]
//! handles: a sampler carries no registry, so the graph stays acyclic and a
//! chain is torn down as soon as its root is dropped.

use std::sync::Arc;

use parking_lot::ReentrantMutex;
use smallvec::SmallVec;

use super::event::{EventInput, EventOutput, EventSink};
use super::input::{Input, Sampler};
use super::listeners::ListenerRegistry;
use super::value::{Slot, Value, ValueSource};
use crate::error::Result;

/// The listener a derived source registers with its upstreams.
struct Recompute<V: Value> {
    /// The computation function.
    compute: Box<dyn Fn() -> V + Send + Sync>,

    /// The cached value.
    cache: Arc<Slot<V>>,

    /// Listeners of the derived source.
    listeners: ListenerRegistry,

    /// Serializes recompute-and-notify.
    delivery: ReentrantMutex<()>,
}

impl<V: Value> EventSink for Recompute<V> {
    fn event(&self) -> Result<()> {
        let _order = self.delivery.lock();
        let value = (self.compute)();
        if self.cache.replace(value) {
            self.listeners.notify()
        } else {
            Ok(())
        }
    }
}

/// Build a derived source over `upstreams`.
pub(crate) fn derive<V, F>(upstreams: &[EventInput], compute: F) -> Input<V>
where
    V: Value,
    F: Fn() -> V + Send + Sync + 'static,
{
    let cache = Arc::new(Slot::new(compute()));
    let listeners = ListenerRegistry::new();
    let recompute = EventOutput::new(Recompute {
        compute: Box::new(compute),
        cache: Arc::clone(&cache),
        listeners: listeners.clone(),
        delivery: ReentrantMutex::new(()),
    });

    let mut distinct: SmallVec<[&EventInput; 4]> = SmallVec::new();
    for upstream in upstreams {
        if !distinct.iter().any(|seen| seen.ptr_eq(upstream)) {
            distinct.push(upstream);
        }
    }
    for upstream in distinct {
        upstream.subscribe(recompute.clone());
    }

    Input::from_parts(
        cache as Arc<dyn ValueSource<V>>,
        EventInput::new(listeners),
    )
}

/// Derive from one input through a pure function.
pub(crate) fn map<A, V, F>(input: &Input<A>, f: F) -> Input<V>
where
    A: Value,
    V: Value,
    F: Fn(A) -> V + Send + Sync + 'static,
{
    let a: Sampler<A> = input.sampler();
    derive(&[input.updates()], move || f(a.get()))
}

/// Derive from two inputs through a pure function.
pub(crate) fn zip_with<A, B, V, F>(left: &Input<A>, right: &Input<B>, f: F) -> Input<V>
where
    A: Value,
    B: Value,
    V: Value,
    F: Fn(A, B) -> V + Send + Sync + 'static,
{
    let a = left.sampler();
    let b = right.sampler();
    derive(&[left.updates(), right.updates()], move || f(a.get(), b.get()))
}
