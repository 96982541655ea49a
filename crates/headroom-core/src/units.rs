//! Unit newtypes for the quantities a headroom study handles.
//!
//! Active, reactive and apparent power are kept apart at the type level so a
//! Mvar increment can never be added to a MW total by accident. Every type is
//! `#[repr(transparent)]` over `f64` and serializes as a bare number.
//!
//! ```
//! use headroom_core::units::{Megavars, Megawatts};
//!
//! let p = Megawatts(90.0);
//! let q = p.reactive_at_power_factor(0.9);
//! assert!((q.value() - 43.589).abs() < 1e-3);
//! let s = p.apparent_power(q);
//! assert!((s.value() - 100.0).abs() < 1e-9);
//! # let _ = Megavars(0.0);
//! ```

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub};

macro_rules! unit_type {
    ($type:ident, $unit_name:literal) => {
        impl Add for $type {
            type Output = Self;
            fn add(self, rhs: Self) -> Self {
                Self(self.0 + rhs.0)
            }
        }

        impl AddAssign for $type {
            fn add_assign(&mut self, rhs: Self) {
                self.0 += rhs.0;
            }
        }

        impl Sub for $type {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self {
                Self(self.0 - rhs.0)
            }
        }

        impl Neg for $type {
            type Output = Self;
            fn neg(self) -> Self {
                Self(-self.0)
            }
        }

        impl Mul<f64> for $type {
            type Output = Self;
            fn mul(self, rhs: f64) -> Self {
                Self(self.0 * rhs)
            }
        }

        impl Div<f64> for $type {
            type Output = Self;
            fn div(self, rhs: f64) -> Self {
                Self(self.0 / rhs)
            }
        }

        impl Div<$type> for $type {
            type Output = f64;
            fn div(self, rhs: $type) -> f64 {
                self.0 / rhs.0
            }
        }

        impl std::fmt::Display for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{:.3} {}", self.0, $unit_name)
            }
        }

        impl std::iter::Sum for $type {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }

        impl $type {
            pub const ZERO: Self = Self(0.0);

            #[inline]
            pub const fn new(value: f64) -> Self {
                Self(value)
            }

            #[inline]
            pub const fn value(self) -> f64 {
                self.0
            }

            #[inline]
            pub fn abs(self) -> Self {
                Self(self.0.abs())
            }

            #[inline]
            pub fn min(self, other: Self) -> Self {
                Self(self.0.min(other.0))
            }

            #[inline]
            pub fn max(self, other: Self) -> Self {
                Self(self.0.max(other.0))
            }

            #[inline]
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }
        }
    };
}

/// Active power (MW).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Megawatts(pub f64);

unit_type!(Megawatts, "MW");

/// Reactive power (Mvar).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Megavars(pub f64);

unit_type!(Megavars, "Mvar");

/// Apparent power (MVA). Thermal ratings are expressed in this unit.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct MegavoltAmperes(pub f64);

unit_type!(MegavoltAmperes, "MVA");

/// Voltage magnitude in per-unit of the bus base voltage.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct PerUnit(pub f64);

unit_type!(PerUnit, "pu");

/// Nominal voltage (kV).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Kilovolts(pub f64);

unit_type!(Kilovolts, "kV");

impl Megawatts {
    /// S = √(P² + Q²)
    #[inline]
    pub fn apparent_power(self, q: Megavars) -> MegavoltAmperes {
        MegavoltAmperes(self.0.hypot(q.0))
    }

    /// Reactive companion of this active power at a lagging power factor:
    /// `Q = P · tan(acos(pf))`.
    ///
    /// `pf` must lie in (0, 1]; unity yields zero Mvar.
    #[inline]
    pub fn reactive_at_power_factor(self, power_factor: f64) -> Megavars {
        Megavars(self.0 * power_factor.acos().tan())
    }
}

impl PerUnit {
    pub const ONE: Self = Self(1.0);
}
