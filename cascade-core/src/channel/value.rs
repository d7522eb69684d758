//! Channel value kinds and shared storage.

use std::fmt::Debug;

use parking_lot::Mutex;

/// A value that can flow through a channel.
///
/// Change detection uses [`Value::same`] rather than `PartialEq`. For floats
/// this is a bit-exact comparison: two `NaN` writes with the same payload
/// count as unchanged, while `0.0` and `-0.0` count as different.
pub trait Value: Copy + Send + Sync + Debug + 'static {
    /// True if `self` and `other` are indistinguishable to subscribers.
    fn same(self, other: Self) -> bool;
}

impl Value for bool {
    fn same(self, other: Self) -> bool {
        self == other
    }
}

impl Value for f32 {
    fn same(self, other: Self) -> bool {
        self.to_bits() == other.to_bits()
    }
}

impl Value for usize {
    fn same(self, other: Self) -> bool {
        self == other
    }
}

/// Anything that can report a current value.
pub trait ValueSource<V>: Send + Sync {
    fn get(&self) -> V;
}

impl<V, F> ValueSource<V> for F
where
    F: Fn() -> V + Send + Sync,
{
    fn get(&self) -> V {
        self()
    }
}

/// A single stored value shared between a writer and its readers.
#[derive(Debug)]
pub(crate) struct Slot<V> {
    value: Mutex<V>,
}

impl<V: Value> Slot<V> {
    pub(crate) fn new(value: V) -> Self {
        Self {
            value: Mutex::new(value),
        }
    }

    /// Store `value`, returning true if it differs from the previous one.
    pub(crate) fn replace(&self, value: V) -> bool {
        let previous = std::mem::replace(&mut *self.value.lock(), value);
        !previous.same(value)
    }
}

impl<V: Value> ValueSource<V> for Slot<V> {
    fn get(&self) -> V {
        *self.value.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn float_sameness_is_bitwise() {
        assert!(f32::NAN.same(f32::NAN));
        assert!(!0.0f32.same(-0.0));
        assert!(1.5f32.same(1.5));
    }

    #[test]
    fn slot_reports_changes() {
        let slot = Slot::new(1.0f32);
        assert!(!slot.replace(1.0));
        assert!(slot.replace(2.0));
        assert_eq!(slot.get(), 2.0);

        slot.replace(f32::NAN);
        assert!(!slot.replace(f32::NAN));
    }

    proptest! {
        #[test]
        fn replace_reports_change_iff_bits_differ(first in any::<u32>(), second in any::<u32>()) {
            let (a, b) = (f32::from_bits(first), f32::from_bits(second));
            let slot = Slot::new(a);
            prop_assert_eq!(slot.replace(b), first != second);
            prop_assert_eq!(slot.get().to_bits(), second);
        }
    }
}
