//! Float combinators.
//!
//! Arithmetic and predicates are derived sources over their operands.
//! Ramping and derivative are driven by an explicit trigger (usually a
//! [`Ticker`](crate::time::Ticker)), since they depend on how often they are
//! evaluated.

use std::ops::{Add, Div, Mul, Neg, Sub};

use parking_lot::Mutex;

use crate::channel::{
    BooleanInput, BooleanOutput, EventInput, EventOutput, FloatCell, FloatInput, FloatOutput,
};
use crate::error::{Error, Result};
use crate::time::SharedClock;

fn check_deadzone(threshold: f32) -> Result<()> {
    if threshold.is_finite() && threshold >= 0.0 {
        Ok(())
    } else {
        Err(Error::invalid_argument(format!(
            "deadzone threshold must be finite and non-negative, got {threshold}"
        )))
    }
}

fn apply_deadzone(value: f32, threshold: f32) -> f32 {
    if value.abs() < threshold {
        0.0
    } else {
        value
    }
}

/// One ramping step from `current` toward `target`.
#[allow(clippy::neg_cmp_op_on_partial_ord)]
pub(crate) fn ramp_step(current: f32, target: f32, step: f32) -> f32 {
    let delta = target - current;
    if !(delta.abs() > step) {
        target
    } else if delta > 0.0 {
        current + step
    } else {
        current - step
    }
}

impl FloatInput {
    pub fn plus(&self, other: impl Into<FloatInput>) -> FloatInput {
        self.zip_with(&other.into(), |a, b| a + b)
    }

    pub fn minus(&self, other: impl Into<FloatInput>) -> FloatInput {
        self.zip_with(&other.into(), |a, b| a - b)
    }

    /// `other - self`
    pub fn minus_rev(&self, other: impl Into<FloatInput>) -> FloatInput {
        self.zip_with(&other.into(), |a, b| b - a)
    }

    pub fn multiplied_by(&self, other: impl Into<FloatInput>) -> FloatInput {
        self.zip_with(&other.into(), |a, b| a * b)
    }

    pub fn divided_by(&self, other: impl Into<FloatInput>) -> FloatInput {
        self.zip_with(&other.into(), |a, b| a / b)
    }

    /// `other / self`
    pub fn divided_by_rev(&self, other: impl Into<FloatInput>) -> FloatInput {
        self.zip_with(&other.into(), |a, b| b / a)
    }

    /// Arithmetic negation. Negating a negation returns the original handle.
    pub fn negated(&self) -> FloatInput {
        if let Some(original) = self.inverse() {
            return original.clone();
        }
        self.map(|v| -v).with_inverse(self)
    }

    pub fn absolute(&self) -> FloatInput {
        self.map(f32::abs)
    }

    /// True while the value is `>= minimum`.
    pub fn at_least(&self, minimum: f32) -> BooleanInput {
        self.map(move |v| v >= minimum)
    }

    /// True while the value is `<= maximum`.
    pub fn at_most(&self, maximum: f32) -> BooleanInput {
        self.map(move |v| v <= maximum)
    }

    /// True while `minimum <= value <= maximum`.
    #[allow(clippy::neg_cmp_op_on_partial_ord)]
    pub fn in_range(&self, minimum: f32, maximum: f32) -> Result<BooleanInput> {
        if !(minimum <= maximum) {
            return Err(Error::invalid_argument(format!(
                "range bounds are inverted or not comparable: [{minimum}, {maximum}]"
            )));
        }
        Ok(self.map(move |v| v >= minimum && v <= maximum))
    }

    /// True while the value lies outside `[minimum, maximum]`.
    pub fn outside_range(&self, minimum: f32, maximum: f32) -> Result<BooleanInput> {
        Ok(self.in_range(minimum, maximum)?.not())
    }

    /// Values whose magnitude is below `threshold` read as exactly zero.
    pub fn deadzone(&self, threshold: f32) -> Result<FloatInput> {
        check_deadzone(threshold)?;
        Ok(self.map(move |v| apply_deadzone(v, threshold)))
    }

    /// Map `zero` to 0 and `one` to 1 linearly, extrapolating outside.
    pub fn normalize(&self, zero: f32, one: f32) -> Result<FloatInput> {
        if !zero.is_finite() || !one.is_finite() {
            return Err(Error::invalid_argument(format!(
                "normalize bounds must be finite, got [{zero}, {one}]"
            )));
        }
        let range = one - zero;
        if !range.is_finite() {
            return Err(Error::invalid_argument(format!(
                "normalize range overflows: [{zero}, {one}]"
            )));
        }
        let scale = 1.0 / range;
        if !scale.is_finite() || scale == 0.0 {
            return Err(Error::invalid_argument(format!(
                "normalize range is too small: [{zero}, {one}]"
            )));
        }
        Ok(self.map(move |v| (v - zero) * scale))
    }

    /// Follow this input, moving at most `step` per `trigger` firing.
    ///
    /// The ramped value starts at the current value of this input and
    /// lands exactly on the target once it is within one step.
    pub fn with_ramping(&self, step: f32, trigger: &EventInput) -> Result<FloatInput> {
        if !(step.is_finite() && step > 0.0) {
            return Err(Error::invalid_argument(format!(
                "ramping step must be finite and positive, got {step}"
            )));
        }
        let ramped = FloatCell::new(self.get());
        let target = self.sampler();
        let cell = ramped.clone();
        trigger.subscribe(EventOutput::from_fn(move || {
            cell.set(ramp_step(cell.get(), target.get(), step))
        }));
        Ok(ramped.as_input())
    }

    /// Rate of change in units per second, sampled on each `trigger`.
    ///
    /// The first sample reads 0. A sample whose clock reading has not
    /// advanced past the previous one is ignored.
    pub fn derivative(&self, clock: &SharedClock, trigger: &EventInput) -> FloatInput {
        let rate = FloatCell::new(0.0);
        let value = self.sampler();
        let clock = clock.clone();
        let last: Mutex<Option<(f32, u64)>> = Mutex::new(None);
        let cell = rate.clone();

        trigger.subscribe(EventOutput::from_fn(move || {
            let now = clock.now_nanos();
            let current = value.get();
            let previous = {
                let mut last = last.lock();
                match *last {
                    Some((_, at)) if at >= now => return Ok(()),
                    previous => {
                        *last = Some((current, now));
                        previous
                    }
                }
            };
            match previous {
                None => Ok(()),
                Some((before, at)) => {
                    let seconds = (now - at) as f64 / 1e9;
                    cell.set(((current - before) as f64 / seconds) as f32)
                }
            }
        }));
        rate.as_input()
    }
}

impl FloatOutput {
    /// An output that writes the negation here. Negating twice returns the
    /// original handle.
    pub fn negate(&self) -> FloatOutput {
        if let Some(original) = self.inverse() {
            return original.clone();
        }
        self.contramap(|v: f32| -v).with_inverse(self)
    }

    /// Writes whose magnitude is below `threshold` arrive here as zero.
    pub fn output_deadzone(&self, threshold: f32) -> Result<FloatOutput> {
        check_deadzone(threshold)?;
        Ok(self.contramap(move |v: f32| apply_deadzone(v, threshold)))
    }

    /// An output whose writes reach this one at most `step` per `trigger`
    /// firing. The ramp starts from 0. Nothing is written here until a
    /// firing moves it.
    pub fn add_ramping(&self, step: f32, trigger: &EventInput) -> Result<FloatOutput> {
        let target = FloatCell::new(0.0);
        let ramped = target.as_input().with_ramping(step, trigger)?;
        let value = ramped.sampler();
        let output = self.clone();
        ramped.on_update(EventOutput::from_fn(move || output.set(value.get())));
        Ok(target.as_output())
    }

    /// A boolean output that writes `on` here for true and `off` for false.
    pub fn from_boolean(&self, off: f32, on: f32) -> BooleanOutput {
        self.contramap(move |v: bool| if v { on } else { off })
    }
}

macro_rules! float_operator {
    ($trait:ident, $method:ident, $forward:ident, $reverse:ident) => {
        impl $trait<&FloatInput> for &FloatInput {
            type Output = FloatInput;

            fn $method(self, rhs: &FloatInput) -> FloatInput {
                self.$forward(rhs)
            }
        }

        impl $trait<f32> for &FloatInput {
            type Output = FloatInput;

            fn $method(self, rhs: f32) -> FloatInput {
                self.$forward(rhs)
            }
        }

        impl $trait<&FloatInput> for f32 {
            type Output = FloatInput;

            fn $method(self, rhs: &FloatInput) -> FloatInput {
                rhs.$reverse(self)
            }
        }
    };
}

float_operator!(Add, add, plus, plus);
float_operator!(Sub, sub, minus, minus_rev);
float_operator!(Mul, mul, multiplied_by, multiplied_by);
float_operator!(Div, div, divided_by, divided_by_rev);

impl Neg for &FloatInput {
    type Output = FloatInput;

    fn neg(self) -> FloatInput {
        self.negated()
    }
}
