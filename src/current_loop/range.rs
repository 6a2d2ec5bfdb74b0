// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the field-device-emulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Current loop spans and the range-mapping engine
//!
//! The engine converts a sensed physical value into a loop current by linear
//! interpolation between the sensor span and the loop span:
//!
//! ```text
//! ratio  = (sensed - min_sense) / (max_sense - min_sense)
//! output = out_min + ratio * (out_max - out_min)
//! ```
//!
//! All functions here are pure. Validation always happens before any
//! interpolation so callers can reject a value without touching state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Absolute lower bound of any current loop output, in milliamps.
pub const LOOP_MIN_MA: f64 = 0.0;
/// Absolute upper bound of any current loop output, in milliamps.
pub const LOOP_MAX_MA: f64 = 20.0;
/// Live-zero lower bound of a 4-20mA loop, in milliamps.
pub const LIVE_ZERO_MA: f64 = 4.0;

/// Logical span of a current loop output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CurrentLoopRange {
    /// 0-20mA loop
    #[serde(rename = "0-20")]
    ZeroToTwenty,
    /// 4-20mA loop (live zero, most common in the field)
    #[default]
    #[serde(rename = "4-20")]
    FourToTwenty,
}

impl CurrentLoopRange {
    /// Returns the `(min, max)` output span in milliamps.
    pub fn output_span(self) -> (f64, f64) {
        match self {
            CurrentLoopRange::ZeroToTwenty => (LOOP_MIN_MA, LOOP_MAX_MA),
            CurrentLoopRange::FourToTwenty => (LIVE_ZERO_MA, LOOP_MAX_MA),
        }
    }
}

impl fmt::Display for CurrentLoopRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurrentLoopRange::ZeroToTwenty => write!(f, "0-20mA"),
            CurrentLoopRange::FourToTwenty => write!(f, "4-20mA"),
        }
    }
}

impl FromStr for CurrentLoopRange {
    type Err = ParseLoopRangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_end_matches("mA") {
            "0-20" | "0_20" => Ok(CurrentLoopRange::ZeroToTwenty),
            "4-20" | "4_20" => Ok(CurrentLoopRange::FourToTwenty),
            other => Err(ParseLoopRangeError(other.to_string())),
        }
    }
}

/// Errors raised by the range-mapping engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RangeError {
    #[error("value {value} is outside the valid span {min} to {max}")]
    OutOfRange { value: f64, min: f64, max: f64 },
    #[error("invalid span: minimum {min} must be finite and less than maximum {max}")]
    InvalidSpan { min: f64, max: f64 },
}

/// Error returned when a loop range string is neither `0-20` nor `4-20`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown current loop range '{0}' (expected 0-20 or 4-20)")]
pub struct ParseLoopRangeError(pub String);

/// Check that `min < max` and that both bounds and the span width are finite.
pub fn validate_span(min: f64, max: f64) -> Result<(), RangeError> {
    if !(min.is_finite() && max.is_finite() && min < max && (max - min).is_finite()) {
        return Err(RangeError::InvalidSpan { min, max });
    }
    Ok(())
}

/// Map a sensed value onto the loop span of `range`.
///
/// ### Errors
///
/// * [`RangeError::InvalidSpan`] if the sensor span is not valid
/// * [`RangeError::OutOfRange`] if `sensed` lies outside `[min_sense, max_sense]`
///   (NaN is always out of range)
///
/// ### Example
///
/// ```
/// use field_device_emulator::current_loop::{map_to_loop, CurrentLoopRange};
///
/// let ma = map_to_loop(50.0, 0.0, 100.0, CurrentLoopRange::FourToTwenty).unwrap();
/// assert!((ma - 12.0).abs() < 1e-9);
/// ```
pub fn map_to_loop(
    sensed: f64,
    min_sense: f64,
    max_sense: f64,
    range: CurrentLoopRange,
) -> Result<f64, RangeError> {
    validate_span(min_sense, max_sense)?;
    if !(min_sense <= sensed && sensed <= max_sense) {
        return Err(RangeError::OutOfRange {
            value: sensed,
            min: min_sense,
            max: max_sense,
        });
    }

    let (out_min, out_max) = range.output_span();
    let ratio = ((sensed - min_sense) / (max_sense - min_sense)).clamp(0.0, 1.0);

    // Endpoints are returned verbatim so that min/max map exactly.
    if ratio == 0.0 {
        return Ok(out_min);
    }
    if ratio == 1.0 {
        return Ok(out_max);
    }
    Ok(out_min + ratio * (out_max - out_min))
}

/// Inverse of [`map_to_loop`]: recover the sensed value a loop current stands for.
pub fn loop_to_sensed(
    milliamps: f64,
    min_sense: f64,
    max_sense: f64,
    range: CurrentLoopRange,
) -> Result<f64, RangeError> {
    validate_span(min_sense, max_sense)?;
    let (out_min, out_max) = range.output_span();
    if !(out_min <= milliamps && milliamps <= out_max) {
        return Err(RangeError::OutOfRange {
            value: milliamps,
            min: out_min,
            max: out_max,
        });
    }

    let ratio = ((milliamps - out_min) / (out_max - out_min)).clamp(0.0, 1.0);
    if ratio == 1.0 {
        return Ok(max_sense);
    }
    Ok(min_sense + ratio * (max_sense - min_sense))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn four_to_twenty_endpoints_and_midpoint() {
        let r = CurrentLoopRange::FourToTwenty;
        assert_eq!(map_to_loop(-40.0, -40.0, 125.0, r).unwrap(), 4.0);
        assert_eq!(map_to_loop(125.0, -40.0, 125.0, r).unwrap(), 20.0);
        assert_abs_diff_eq!(map_to_loop(42.5, -40.0, 125.0, r).unwrap(), 12.0, epsilon = 1e-6);
    }

    #[test]
    fn zero_to_twenty_endpoints() {
        let r = CurrentLoopRange::ZeroToTwenty;
        assert_eq!(map_to_loop(0.0, 0.0, 10.0, r).unwrap(), 0.0);
        assert_eq!(map_to_loop(10.0, 0.0, 10.0, r).unwrap(), 20.0);
        assert_abs_diff_eq!(map_to_loop(2.5, 0.0, 10.0, r).unwrap(), 5.0, epsilon = 1e-9);
    }

    #[test]
    fn endpoints_are_exact_for_awkward_spans() {
        let r = CurrentLoopRange::FourToTwenty;
        assert_eq!(map_to_loop(0.3, 0.1, 0.3, r).unwrap(), 20.0);
        assert_eq!(map_to_loop(0.1, 0.1, 0.3, r).unwrap(), 4.0);
    }

    #[test]
    fn out_of_range_reports_value_and_span() {
        let err = map_to_loop(100.1, 0.0, 100.0, CurrentLoopRange::FourToTwenty).unwrap_err();
        assert_eq!(
            err,
            RangeError::OutOfRange {
                value: 100.1,
                min: 0.0,
                max: 100.0
            }
        );
        assert!(map_to_loop(-0.1, 0.0, 100.0, CurrentLoopRange::FourToTwenty).is_err());
        assert!(map_to_loop(f64::NAN, 0.0, 100.0, CurrentLoopRange::FourToTwenty).is_err());
    }

    #[test]
    fn invalid_spans_are_rejected() {
        assert!(validate_span(1.0, 1.0).is_err());
        assert!(validate_span(2.0, 1.0).is_err());
        assert!(validate_span(f64::NAN, 1.0).is_err());
        assert!(validate_span(0.0, f64::INFINITY).is_err());
        assert!(validate_span(-1.0, 1.0).is_ok());
    }

    #[test]
    fn overflowing_span_width_is_rejected() {
        assert_eq!(
            validate_span(-f64::MAX, f64::MAX),
            Err(RangeError::InvalidSpan {
                min: -f64::MAX,
                max: f64::MAX
            })
        );
        let result = map_to_loop(f64::MAX, -f64::MAX, f64::MAX, CurrentLoopRange::FourToTwenty);
        assert!(matches!(result, Err(RangeError::InvalidSpan { .. })));
        assert!(validate_span(-f64::MAX / 2.0, f64::MAX / 2.0).is_ok());
    }

    #[test]
    fn inverse_mapping() {
        let r = CurrentLoopRange::FourToTwenty;
        assert_abs_diff_eq!(loop_to_sensed(12.0, 0.0, 100.0, r).unwrap(), 50.0, epsilon = 1e-9);
        assert_eq!(loop_to_sensed(20.0, 0.0, 100.0, r).unwrap(), 100.0);
        assert!(loop_to_sensed(3.9, 0.0, 100.0, r).is_err());
    }

    #[test]
    fn parse_and_display_loop_ranges() {
        assert_eq!("4-20".parse::<CurrentLoopRange>().unwrap(), CurrentLoopRange::FourToTwenty);
        assert_eq!("0-20mA".parse::<CurrentLoopRange>().unwrap(), CurrentLoopRange::ZeroToTwenty);
        assert!("1-5".parse::<CurrentLoopRange>().is_err());
        assert_eq!(CurrentLoopRange::FourToTwenty.to_string(), "4-20mA");
    }
}
