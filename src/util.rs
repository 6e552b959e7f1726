//! Miscellaneous utility structs and functions.

use std::fmt::Debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An interval on the real number line.
#[derive(Copy, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Interval {
    pub min: f64,
    pub max: f64,
}

impl Interval {
    /// Creates a new interval.
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Returns true if this interval contains the value.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Gets the magnitude of the interval.
    pub fn length(&self) -> f64 {
        self.max - self.min
    }

    /// Clamps `value` into the interval. Non-finite values map to `min`.
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_finite() {
            value.clamp(self.min, self.max)
        } else {
            self.min
        }
    }

    /// Returns an interval with ordered ends, both at least `floor`.
    pub fn normalized(&self, floor: f64) -> Self {
        let a = if self.min.is_finite() { self.min } else { floor };
        let b = if self.max.is_finite() { self.max } else { a };
        Self {
            min: f64::max(f64::min(a, b), floor),
            max: f64::max(f64::max(a, b), floor),
        }
    }
}

impl Debug for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Interval({:?}, {:?})", &self.min, &self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_handles_nan() {
        let iv = Interval::new(5.0, 90.0);
        assert_eq!(iv.clamp(f64::NAN), 5.0);
        assert_eq!(iv.clamp(-3.0), 5.0);
        assert_eq!(iv.clamp(120.0), 90.0);
        assert_eq!(iv.clamp(42.0), 42.0);
    }

    #[test]
    fn normalized_orders_and_floors() {
        let iv = Interval::new(60.0, -1.0).normalized(0.5);
        assert_eq!(iv, Interval::new(0.5, 60.0));
    }
}
