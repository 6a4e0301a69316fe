//! Unit-safe quantities for planning data.
//!
//! Capacity, flow limits and reserve requirements are carried as
//! [`Megawatts`]; emission rates as [`TonnesPerMwh`]. Both are
//! `#[repr(transparent)]` wrappers over `f64`, so mixing an emission rate
//! into a capacity sum is a compile error rather than a silent bug.
//!
//! ```
//! use gridplan_core::units::{Megawatts, TonnesPerMwh};
//!
//! let existing = Megawatts(250.0);
//! let total = existing + Megawatts(50.0);
//! assert_eq!(total.value(), 300.0);
//!
//! let rate = TonnesPerMwh(0.42);
//! assert_eq!(rate.emissions_for(Megawatts(100.0)), 42.0);
//! ```

use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Neg, Sub};

macro_rules! impl_unit_ops {
    ($type:ty, $unit_name:literal) => {
        impl Add for $type {
            type Output = Self;
            fn add(self, rhs: Self) -> Self::Output {
                Self(self.0 + rhs.0)
            }
        }

        impl Sub for $type {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self::Output {
                Self(self.0 - rhs.0)
            }
        }

        impl Neg for $type {
            type Output = Self;
            fn neg(self) -> Self::Output {
                Self(-self.0)
            }
        }

        impl Mul<f64> for $type {
            type Output = Self;
            fn mul(self, rhs: f64) -> Self::Output {
                Self(self.0 * rhs)
            }
        }

        impl Div<f64> for $type {
            type Output = Self;
            fn div(self, rhs: f64) -> Self::Output {
                Self(self.0 / rhs)
            }
        }

        impl std::fmt::Display for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{:.4} {}", self.0, $unit_name)
            }
        }

        impl $type {
            #[inline]
            pub const fn new(value: f64) -> Self {
                Self(value)
            }

            #[inline]
            pub const fn value(self) -> f64 {
                self.0
            }

            #[inline]
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }

            /// True for finite, non-negative values.
            #[inline]
            pub fn is_physical(self) -> bool {
                self.0.is_finite() && self.0 >= 0.0
            }
        }

        impl std::iter::Sum for $type {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }

        impl<'a> std::iter::Sum<&'a $type> for $type {
            fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }
    };
}

/// Active power or capacity in megawatts (MW).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Megawatts(pub f64);

impl_unit_ops!(Megawatts, "MW");

/// Emission intensity in metric tonnes per megawatt-hour.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct TonnesPerMwh(pub f64);

impl_unit_ops!(TonnesPerMwh, "t/MWh");

impl TonnesPerMwh {
    /// Tonnes emitted by one hour at `output`.
    pub fn emissions_for(self, output: Megawatts) -> f64 {
        self.0 * output.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_keeps_units() {
        let a = Megawatts(10.0);
        let b = Megawatts(2.5);
        assert_eq!((a + b).value(), 12.5);
        assert_eq!((a - b).value(), 7.5);
        assert_eq!((a * 2.0).value(), 20.0);
        assert_eq!((a / 4.0).value(), 2.5);
        assert_eq!((-a).value(), -10.0);
    }

    #[test]
    fn physical_rejects_negative_and_nan() {
        assert!(Megawatts(0.0).is_physical());
        assert!(!Megawatts(-1.0).is_physical());
        assert!(!Megawatts(f64::NAN).is_physical());
    }

    #[test]
    fn sums_iterators() {
        let caps = [Megawatts(1.0), Megawatts(2.0), Megawatts(3.0)];
        let total: Megawatts = caps.iter().sum();
        assert_eq!(total, Megawatts(6.0));
    }

    #[test]
    fn display_includes_unit() {
        assert_eq!(Megawatts(1.5).to_string(), "1.5000 MW");
        assert_eq!(TonnesPerMwh(0.25).to_string(), "0.2500 t/MWh");
    }
}
