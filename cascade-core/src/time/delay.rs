use std::fmt;
use std::time::Duration;

use crate::channel::{FloatInput, Sampler};

/// A timer delay, either fixed or re-read (in seconds) each time a timer
/// is armed.
#[derive(Clone)]
pub(crate) enum Delay {
    Fixed(Duration),
    Dynamic(Sampler<f32>),
}

impl Delay {
    pub(crate) fn dynamic(seconds: &FloatInput) -> Self {
        Delay::Dynamic(seconds.sampler())
    }

    /// The delay to arm with now. Negative or NaN readings arm immediately;
    /// readings too large to represent never fire.
    pub(crate) fn resolve(&self) -> Duration {
        match self {
            Delay::Fixed(duration) => *duration,
            Delay::Dynamic(seconds) => {
                let seconds = seconds.get();
                if seconds.is_nan() || seconds <= 0.0 {
                    Duration::ZERO
                } else {
                    Duration::try_from_secs_f32(seconds).unwrap_or(Duration::MAX)
                }
            }
        }
    }
}

impl fmt::Debug for Delay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delay::Fixed(duration) => f.debug_tuple("Fixed").field(duration).finish(),
            Delay::Dynamic(seconds) => f.debug_tuple("Dynamic").field(&seconds.get()).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::FloatCell;

    #[test]
    fn dynamic_delay_reads_current_value() {
        let seconds = FloatCell::new(0.5);
        let delay = Delay::dynamic(&seconds.as_input());
        assert_eq!(delay.resolve(), Duration::from_millis(500));

        seconds.set(-1.0).unwrap();
        assert_eq!(delay.resolve(), Duration::ZERO);
        seconds.set(f32::INFINITY).unwrap();
        assert_eq!(delay.resolve(), Duration::MAX);
    }
}
