//! Boolean combinators.

use std::ops::{BitAnd, BitOr, BitXor, Not};

use parking_lot::Mutex;

use crate::channel::{
    BooleanInput, BooleanOutput, Cancel, EventCell, EventInput, EventOutput, FloatInput,
};
use crate::error::Result;

/// Which transitions an edge detector reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Rising,
    Falling,
}

impl BooleanInput {
    pub fn and(&self, other: &BooleanInput) -> BooleanInput {
        self.zip_with(other, |a, b| a && b)
    }

    pub fn or(&self, other: &BooleanInput) -> BooleanInput {
        self.zip_with(other, |a, b| a || b)
    }

    pub fn xor(&self, other: &BooleanInput) -> BooleanInput {
        self.zip_with(other, |a, b| a ^ b)
    }

    /// `self && !other`
    pub fn and_not(&self, other: &BooleanInput) -> BooleanInput {
        self.zip_with(other, |a, b| a && !b)
    }

    /// `self || !other`
    pub fn or_not(&self, other: &BooleanInput) -> BooleanInput {
        self.zip_with(other, |a, b| a || !b)
    }

    /// Logical negation. Negating a negation returns the original handle.
    ///
    /// ```rust
    /// use cascade_core::channel::BooleanCell;
    ///
    /// let cell = BooleanCell::new(false);
    /// let input = cell.as_input();
    /// assert!(input.not().not().ptr_eq(&input));
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn not(&self) -> BooleanInput {
        if let Some(original) = self.inverse() {
            return original.clone();
        }
        self.map(|v| !v).with_inverse(self)
    }

    /// Fires when the value goes from false to true.
    pub fn on_press(&self) -> EventInput {
        self.edges(Edge::Rising)
    }

    /// Fires when the value goes from true to false.
    pub fn on_release(&self) -> EventInput {
        self.edges(Edge::Falling)
    }

    /// Fires on every change.
    pub fn on_change(&self) -> EventInput {
        self.updates()
    }

    /// `on` while true, `off` while false.
    pub fn to_float(&self, off: f32, on: f32) -> FloatInput {
        self.map(move |v| if v { on } else { off })
    }

    /// Follow `on_true` while true and `on_false` while false.
    pub fn select(&self, on_false: &FloatInput, on_true: &FloatInput) -> FloatInput {
        let selector = self.sampler();
        let when_false = on_false.sampler();
        let when_true = on_true.sampler();
        FloatInput::derived(
            &[self.updates(), on_false.updates(), on_true.updates()],
            move || {
                if selector.get() {
                    when_true.get()
                } else {
                    when_false.get()
                }
            },
        )
    }

    fn edges(&self, edge: Edge) -> EventInput {
        let events = EventCell::new();
        let value = self.sampler();
        let last = Mutex::new(self.get());
        let fire = events.clone();

        self.on_update(EventOutput::from_fn(move || {
            let now = value.get();
            let before = std::mem::replace(&mut *last.lock(), now);
            let crossed = match edge {
                Edge::Rising => !before && now,
                Edge::Falling => before && !now,
            };
            if crossed {
                fire.event()
            } else {
                Ok(())
            }
        }));
        events.as_input()
    }
}

impl BooleanOutput {
    /// An output that writes the negation here. Inverting an inverted output
    /// returns the original handle.
    pub fn invert(&self) -> BooleanOutput {
        if let Some(original) = self.inverse() {
            return original.clone();
        }
        self.contramap(|v: bool| !v).with_inverse(self)
    }

    /// Polarized dispatch: writing `true` fires `on_true`, writing `false`
    /// fires `on_false`.
    pub fn polarize(on_false: &EventOutput, on_true: &EventOutput) -> BooleanOutput {
        let on_false = on_false.clone();
        let on_true = on_true.clone();
        BooleanOutput::from_fn(move |v| if v { on_true.event() } else { on_false.event() })
    }

    /// Write `true` every time `event` fires.
    pub fn set_true_when(&self, event: &EventInput) -> Cancel {
        self.set_when(true, event)
    }

    /// Write `false` every time `event` fires.
    pub fn set_false_when(&self, event: &EventInput) -> Cancel {
        self.set_when(false, event)
    }

    /// Raw write of `true`.
    pub fn set_true(&self) -> Result<()> {
        self.set(true)
    }

    /// Raw write of `false`.
    pub fn set_false(&self) -> Result<()> {
        self.set(false)
    }
}

impl Not for &BooleanInput {
    type Output = BooleanInput;

    fn not(self) -> BooleanInput {
        BooleanInput::not(self)
    }
}

impl BitAnd for &BooleanInput {
    type Output = BooleanInput;

    fn bitand(self, rhs: Self) -> BooleanInput {
        self.and(rhs)
    }
}

impl BitOr for &BooleanInput {
    type Output = BooleanInput;

    fn bitor(self, rhs: Self) -> BooleanInput {
        self.or(rhs)
    }
}

impl BitXor for &BooleanInput {
    type Output = BooleanInput;

    fn bitxor(self, rhs: Self) -> BooleanInput {
        self.xor(rhs)
    }
}

/// Shared edge-counting helper for tests in this crate.
#[cfg(test)]
pub(crate) fn count_events(events: &EventInput) -> std::sync::Arc<std::sync::atomic::AtomicUsize> {
    let count = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let count_clone = count.clone();
    events.subscribe(EventOutput::from_fn(move || {
        count_clone.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }));
    count
}
