// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the field-device-emulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Current loop output stage
//!
//! A transmitter only remembers the last current it was commanded to emit.
//! Hardware backends (a DAC or a 4-20mA click board) implement the same
//! trait as the simulated stage used by the emulator and the tests.

use log::debug;
use thiserror::Error;

use super::range::{LIVE_ZERO_MA, LOOP_MAX_MA, LOOP_MIN_MA};

/// Error types for a current loop output stage
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransmitterError {
    #[error("output current {value}mA is outside the loop envelope {min}mA to {max}mA")]
    OutOfRange { value: f64, min: f64, max: f64 },
}

/// Output stage trait for current loop transmitters
pub trait CurrentLoopTransmitter: Send {
    /// Command a new output current in milliamps.
    ///
    /// Values outside the 0-20mA envelope are rejected and the previously
    /// emitted current is kept.
    fn set_output_current(&mut self, milliamps: f64) -> Result<(), TransmitterError>;

    /// Last accepted output current in milliamps.
    fn output_current(&self) -> f64;
}

/// Check a current against the physical 0-20mA envelope.
pub fn check_output_envelope(milliamps: f64) -> Result<(), TransmitterError> {
    if !(LOOP_MIN_MA..=LOOP_MAX_MA).contains(&milliamps) {
        return Err(TransmitterError::OutOfRange {
            value: milliamps,
            min: LOOP_MIN_MA,
            max: LOOP_MAX_MA,
        });
    }
    Ok(())
}

/// Transmitter that only records the commanded current
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedTransmitter {
    last_output_ma: f64,
}

impl Default for SimulatedTransmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedTransmitter {
    /// Create a transmitter idling at 4mA (de-energized loop convention).
    pub fn new() -> Self {
        Self {
            last_output_ma: LIVE_ZERO_MA,
        }
    }

    /// Create a transmitter starting at an explicit current.
    pub fn with_start_current(milliamps: f64) -> Result<Self, TransmitterError> {
        check_output_envelope(milliamps)?;
        Ok(Self {
            last_output_ma: milliamps,
        })
    }
}

impl CurrentLoopTransmitter for SimulatedTransmitter {
    fn set_output_current(&mut self, milliamps: f64) -> Result<(), TransmitterError> {
        check_output_envelope(milliamps)?;
        debug!("Simulated loop output set to {:.4}mA", milliamps);
        self.last_output_ma = milliamps;
        Ok(())
    }

    fn output_current(&self) -> f64 {
        self.last_output_ma
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_live_zero() {
        assert_eq!(SimulatedTransmitter::new().output_current(), 4.0);
    }

    #[test]
    fn explicit_start_current() {
        let tx = SimulatedTransmitter::with_start_current(0.0).unwrap();
        assert_eq!(tx.output_current(), 0.0);
        assert!(SimulatedTransmitter::with_start_current(21.0).is_err());
    }

    #[test]
    fn set_then_get_round_trips_exactly() {
        let mut tx = SimulatedTransmitter::new();
        tx.set_output_current(12.0).unwrap();
        assert_eq!(tx.output_current(), 12.0);
    }

    #[test]
    fn rejected_current_keeps_previous_value() {
        let mut tx = SimulatedTransmitter::new();
        tx.set_output_current(7.5).unwrap();

        for bad in [-0.001, 20.001, f64::NAN, f64::INFINITY] {
            assert!(tx.set_output_current(bad).is_err());
            assert_eq!(tx.output_current(), 7.5);
        }
    }

    #[test]
    fn envelope_bounds_are_inclusive() {
        let mut tx = SimulatedTransmitter::new();
        assert!(tx.set_output_current(0.0).is_ok());
        assert!(tx.set_output_current(20.0).is_ok());
    }
}
