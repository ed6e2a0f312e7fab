// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fixed-point temperature and pressure types.
//!
//! Control loops never touch floating point: every reading and setpoint
//! is an `i16` in tenths of a degree (or hundredths of a bar), so
//! arithmetic is exact and worst-case execution time doesn't depend on
//! an FPU or a software float emulation path.

#![no_std]
#![cfg_attr(not(test), forbid(unsafe_code))]

#[cfg(test)]
extern crate std;

use core::cmp::Ordering;
use core::fmt;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TemperatureError {
    /// The value, converted to tenths of a degree, doesn't fit the
    /// representable domain.
    OutOfRange,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PressureError {
    OutOfRange,
}

/// A temperature in tenths of a degree Celsius, or the sentinel
/// [`Temperature::INVALID`].
///
/// Any arithmetic operation involving an invalid operand yields
/// [`Temperature::INVALID`]; there is no panic path for out-of-domain
/// results, only saturation.
#[derive(
    Copy,
    Clone,
    Eq,
    PartialEq,
    Hash,
    zerocopy_derive::IntoBytes,
    zerocopy_derive::FromBytes,
    zerocopy_derive::Immutable,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "hubpack", derive(hubpack::SerializedSize))]
#[repr(transparent)]
pub struct Temperature(i16);

const SENTINEL: i16 = i16::MIN;

impl Temperature {
    /// Tenths-of-a-degree sentinel meaning "no reading".
    pub const INVALID: Temperature = Temperature(SENTINEL);
    pub const MIN: Temperature = Temperature(SENTINEL + 1);
    pub const MAX: Temperature = Temperature(i16::MAX);

    /// Constructs a value directly from tenths of a degree. `i16::MIN`
    /// collapses to [`Temperature::INVALID`].
    pub const fn from_tenths(tenths: i16) -> Temperature {
        Temperature(tenths)
    }

    /// Constructs a value from a whole number of degrees.
    pub fn from_whole_degrees(degrees: i16) -> Result<Temperature, TemperatureError> {
        degrees
            .checked_mul(10)
            .filter(|&t| t > SENTINEL)
            .map(Temperature)
            .ok_or(TemperatureError::OutOfRange)
    }

    /// Constructs a value from a floating point degree reading, rounding
    /// half away from zero to the nearest tenth.
    pub fn from_celsius_f32(value: f32) -> Result<Temperature, TemperatureError> {
        if !value.is_finite() {
            return Err(TemperatureError::OutOfRange);
        }
        let tenths = round_half_away_from_zero(value * 10.0);
        if tenths <= SENTINEL as f32 || tenths > i16::MAX as f32 {
            return Err(TemperatureError::OutOfRange);
        }
        Ok(Temperature(tenths as i16))
    }

    pub fn is_valid(self) -> bool {
        self.0 != SENTINEL
    }

    pub fn raw_tenths(self) -> i16 {
        self.0
    }

    pub fn to_celsius_f32(self) -> f32 {
        if !self.is_valid() {
            return f32::NAN;
        }
        self.0 as f32 / 10.0
    }

    #[must_use]
    pub fn saturating_add(self, rhs: Temperature) -> Temperature {
        if !self.is_valid() || !rhs.is_valid() {
            return Temperature::INVALID;
        }
        let sum = i32::from(self.0) + i32::from(rhs.0);
        Temperature(sum.clamp(i32::from(Self::MIN.0), i32::from(Self::MAX.0)) as i16)
    }

    #[must_use]
    pub fn saturating_sub(self, rhs: Temperature) -> Temperature {
        if !self.is_valid() || !rhs.is_valid() {
            return Temperature::INVALID;
        }
        let diff = i32::from(self.0) - i32::from(rhs.0);
        Temperature(diff.clamp(i32::from(Self::MIN.0), i32::from(Self::MAX.0)) as i16)
    }

    /// Absolute difference, saturating, `INVALID` if either side is.
    #[must_use]
    pub fn abs_diff(self, rhs: Temperature) -> Temperature {
        if !self.is_valid() || !rhs.is_valid() {
            return Temperature::INVALID;
        }
        if self.0 >= rhs.0 {
            self.saturating_sub(rhs)
        } else {
            rhs.saturating_sub(self)
        }
    }
}

impl PartialOrd for Temperature {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if !self.is_valid() || !other.is_valid() {
            return None;
        }
        self.0.partial_cmp(&other.0)
    }
}

impl fmt::Debug for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_valid() {
            return write!(f, "INVALID");
        }
        let sign = if self.0 < 0 { '-' } else { '+' };
        let mag = self.0.unsigned_abs();
        write!(f, "{}{:02}.{}°C", sign, mag / 10, mag % 10)
    }
}

/// A pressure in hundredths of a bar, or the sentinel
/// [`Pressure::INVALID`].
#[derive(
    Copy,
    Clone,
    Eq,
    PartialEq,
    Hash,
    zerocopy_derive::IntoBytes,
    zerocopy_derive::FromBytes,
    zerocopy_derive::Immutable,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "hubpack", derive(hubpack::SerializedSize))]
#[repr(transparent)]
pub struct Pressure(i16);

impl Pressure {
    pub const INVALID: Pressure = Pressure(SENTINEL);
    pub const MIN: Pressure = Pressure(SENTINEL + 1);
    pub const MAX: Pressure = Pressure(i16::MAX);

    pub const fn from_hundredths(hundredths: i16) -> Pressure {
        Pressure(hundredths)
    }

    pub fn from_bar_f32(value: f32) -> Result<Pressure, PressureError> {
        if !value.is_finite() {
            return Err(PressureError::OutOfRange);
        }
        let hundredths = round_half_away_from_zero(value * 100.0);
        if hundredths <= SENTINEL as f32 || hundredths > i16::MAX as f32 {
            return Err(PressureError::OutOfRange);
        }
        Ok(Pressure(hundredths as i16))
    }

    pub fn is_valid(self) -> bool {
        self.0 != SENTINEL
    }

    pub fn raw_hundredths(self) -> i16 {
        self.0
    }

    pub fn to_bar_f32(self) -> f32 {
        if !self.is_valid() {
            return f32::NAN;
        }
        self.0 as f32 / 100.0
    }
}

impl PartialOrd for Pressure {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if !self.is_valid() || !other.is_valid() {
            return None;
        }
        self.0.partial_cmp(&other.0)
    }
}

impl fmt::Debug for Pressure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Pressure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_valid() {
            return write!(f, "INVALID");
        }
        let sign = if self.0 < 0 { '-' } else { '+' };
        let mag = self.0.unsigned_abs();
        write!(f, "{}{}.{:02} bar", sign, mag / 100, mag % 100)
    }
}

fn round_half_away_from_zero(x: f32) -> f32 {
    if x >= 0.0 {
        (x + 0.5).floor()
    } else {
        (x - 0.5).ceil()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_degrees_round_trip() {
        let t = Temperature::from_whole_degrees(21).unwrap();
        assert_eq!(t.raw_tenths(), 210);
        assert_eq!(t.to_celsius_f32(), 21.0);
    }

    #[test]
    fn float_rounds_half_away_from_zero() {
        assert_eq!(Temperature::from_celsius_f32(21.05).unwrap().raw_tenths(), 211);
        assert_eq!(Temperature::from_celsius_f32(-21.05).unwrap().raw_tenths(), -211);
    }

    #[test]
    fn invalid_propagates_through_arithmetic() {
        let a = Temperature::INVALID;
        let b = Temperature::from_whole_degrees(5).unwrap();
        assert!(!a.saturating_add(b).is_valid());
        assert!(!b.saturating_sub(a).is_valid());
        assert_eq!(a.partial_cmp(&b), None);
    }

    #[test]
    fn saturates_at_domain_edges() {
        let near_max = Temperature::from_tenths(i16::MAX - 1);
        let one = Temperature::from_tenths(10);
        assert_eq!(near_max.saturating_add(one), Temperature::MAX);
    }

    #[test]
    fn out_of_range_float_rejected() {
        assert_eq!(
            Temperature::from_celsius_f32(f32::INFINITY),
            Err(TemperatureError::OutOfRange)
        );
        assert_eq!(
            Temperature::from_celsius_f32(9000.0),
            Err(TemperatureError::OutOfRange)
        );
    }

    #[test]
    fn display_formats_sign_and_tenths() {
        use std::format;
        let t = Temperature::from_whole_degrees(-5).unwrap();
        assert_eq!(format!("{}", t), "-05.0°C");
        assert_eq!(format!("{}", Temperature::INVALID), "INVALID");
    }

    #[test]
    fn abs_diff_is_symmetric() {
        let a = Temperature::from_whole_degrees(80).unwrap();
        let b = Temperature::from_whole_degrees(40).unwrap();
        assert_eq!(a.abs_diff(b), b.abs_diff(a));
        assert_eq!(a.abs_diff(b).raw_tenths(), 400);
    }

    #[test]
    fn pressure_round_trip() {
        let p = Pressure::from_bar_f32(1.50).unwrap();
        assert_eq!(p.raw_hundredths(), 150);
        assert!(p.is_valid());
    }
}
