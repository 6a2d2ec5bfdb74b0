// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the field-device-emulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Range-mapped sensors
//!
//! A range-mapped sensor owns one transmitter, a loop range and a fixed
//! sensing span. Setting a sensed value validates it against the span,
//! interpolates it to milliamps and commands the transmitter. A rejected value
//! never reaches the transmitter.
//!
//! For a 4-20mA temperature transmitter spanning 0°C to 100°C:
//! - 0°C outputs 4mA
//! - 50°C outputs 12mA
//! - 100°C outputs 20mA

use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::range::{map_to_loop, validate_span, CurrentLoopRange, RangeError};
use super::transmitter::{CurrentLoopTransmitter, SimulatedTransmitter, TransmitterError};

/// Physical quantity measured by a sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Temperature,
    Pressure,
    Current,
}

impl SensorKind {
    /// Unit label used in logs and error messages.
    ///
    /// Pressure spans may be in any linear unit, so pressure values are
    /// printed bare.
    pub fn unit(self) -> &'static str {
        match self {
            SensorKind::Temperature => "°C",
            SensorKind::Pressure => "",
            SensorKind::Current => "A",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorKind::Temperature => write!(f, "temperature"),
            SensorKind::Pressure => write!(f, "pressure"),
            SensorKind::Current => write!(f, "current"),
        }
    }
}

/// Errors raised by range-mapped sensors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensorError {
    #[error("{kind} {value}{unit} is outside sensor range {min}{unit} to {max}{unit}", unit = .kind.unit())]
    OutOfRange {
        kind: SensorKind,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("minimum {kind} {min} must be less than maximum {kind} {max}")]
    InvalidSpan { kind: SensorKind, min: f64, max: f64 },
    #[error(transparent)]
    Transmitter(#[from] TransmitterError),
}

impl SensorError {
    fn from_range(kind: SensorKind, err: RangeError) -> Self {
        match err {
            RangeError::OutOfRange { value, min, max } => SensorError::OutOfRange {
                kind,
                value,
                min,
                max,
            },
            RangeError::InvalidSpan { min, max } => SensorError::InvalidSpan { kind, min, max },
        }
    }
}

/// Sensor mapping a physical span onto a current loop
#[derive(Debug)]
pub struct RangeMappedSensor<T: CurrentLoopTransmitter = SimulatedTransmitter> {
    kind: SensorKind,
    transmitter: T,
    range: CurrentLoopRange,
    min_sense: f64,
    max_sense: f64,
    sensed_value: Option<f64>,
}

impl<T: CurrentLoopTransmitter> RangeMappedSensor<T> {
    /// Build a sensor around an exclusively owned transmitter.
    ///
    /// Fails with [`SensorError::InvalidSpan`] unless `min_sense < max_sense`.
    pub fn new(
        kind: SensorKind,
        transmitter: T,
        range: CurrentLoopRange,
        min_sense: f64,
        max_sense: f64,
    ) -> Result<Self, SensorError> {
        validate_span(min_sense, max_sense).map_err(|e| SensorError::from_range(kind, e))?;
        Ok(Self {
            kind,
            transmitter,
            range,
            min_sense,
            max_sense,
            sensed_value: None,
        })
    }

    /// Set the simulated physical value and drive the loop accordingly.
    ///
    /// Returns the commanded loop current in milliamps.
    pub fn set_sensed_value(&mut self, value: f64) -> Result<f64, SensorError> {
        let milliamps = map_to_loop(value, self.min_sense, self.max_sense, self.range)
            .map_err(|e| SensorError::from_range(self.kind, e))?;
        self.transmitter.set_output_current(milliamps)?;
        self.sensed_value = Some(value);
        debug!(
            "{} set to {}{} -> {:.4}mA ({})",
            self.kind,
            value,
            self.kind.unit(),
            milliamps,
            self.range
        );
        Ok(milliamps)
    }

    /// Last accepted sensed value, if any.
    pub fn sensed_value(&self) -> Option<f64> {
        self.sensed_value
    }

    /// Current emitted by the transmitter in milliamps.
    pub fn output_current(&self) -> f64 {
        self.transmitter.output_current()
    }

    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    pub fn range(&self) -> CurrentLoopRange {
        self.range
    }

    pub fn min_sense(&self) -> f64 {
        self.min_sense
    }

    pub fn max_sense(&self) -> f64 {
        self.max_sense
    }

    pub fn transmitter(&self) -> &T {
        &self.transmitter
    }
}

macro_rules! range_mapped_sensor {
    ($(#[$doc:meta])* $name:ident, $kind:expr, $setter:ident, $getter:ident) => {
        $(#[$doc])*
        #[derive(Debug)]
        pub struct $name<T: CurrentLoopTransmitter = SimulatedTransmitter> {
            inner: RangeMappedSensor<T>,
        }

        impl<T: CurrentLoopTransmitter> $name<T> {
            pub fn new(
                transmitter: T,
                range: CurrentLoopRange,
                min_sense: f64,
                max_sense: f64,
            ) -> Result<Self, SensorError> {
                Ok(Self {
                    inner: RangeMappedSensor::new($kind, transmitter, range, min_sense, max_sense)?,
                })
            }

            /// Set the simulated value and return the commanded loop current.
            pub fn $setter(&mut self, value: f64) -> Result<f64, SensorError> {
                self.inner.set_sensed_value(value)
            }

            /// Last accepted simulated value, if any.
            pub fn $getter(&self) -> Option<f64> {
                self.inner.sensed_value()
            }

            pub fn output_current(&self) -> f64 {
                self.inner.output_current()
            }

            pub fn range(&self) -> CurrentLoopRange {
                self.inner.range()
            }

            pub fn min_sense(&self) -> f64 {
                self.inner.min_sense()
            }

            pub fn max_sense(&self) -> f64 {
                self.inner.max_sense()
            }

            pub fn as_sensor(&self) -> &RangeMappedSensor<T> {
                &self.inner
            }

            pub fn as_sensor_mut(&mut self) -> &mut RangeMappedSensor<T> {
                &mut self.inner
            }
        }
    };
}

range_mapped_sensor!(
    /// Temperature transmitter, sensed values in degrees Celsius
    TemperatureTransmitter,
    SensorKind::Temperature,
    set_temperature,
    temperature
);

range_mapped_sensor!(
    /// Pressure transmitter, sensed values in any linear pressure unit
    PressureTransmitter,
    SensorKind::Pressure,
    set_pressure,
    pressure
);

range_mapped_sensor!(
    /// Current transmitter (clamp-on CT style), sensed values in amps
    CurrentTransmitter,
    SensorKind::Current,
    set_current,
    current
);

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn temperature_4_20() -> TemperatureTransmitter {
        TemperatureTransmitter::new(
            SimulatedTransmitter::new(),
            CurrentLoopRange::FourToTwenty,
            0.0,
            100.0,
        )
        .unwrap()
    }

    #[test]
    fn temperature_transmitter_maps_span() {
        let mut sensor = temperature_4_20();
        assert_eq!(sensor.set_temperature(0.0).unwrap(), 4.0);
        assert_abs_diff_eq!(sensor.set_temperature(50.0).unwrap(), 12.0, epsilon = 1e-6);
        assert_eq!(sensor.set_temperature(100.0).unwrap(), 20.0);
        assert_eq!(sensor.output_current(), 20.0);
        assert_eq!(sensor.temperature(), Some(100.0));
    }

    #[test]
    fn rejected_value_leaves_output_unchanged() {
        let mut sensor = temperature_4_20();
        sensor.set_temperature(25.0).unwrap();
        let before = sensor.output_current();

        let err = sensor.set_temperature(150.0).unwrap_err();
        assert!(matches!(
            err,
            SensorError::OutOfRange {
                kind: SensorKind::Temperature,
                value,
                ..
            } if value == 150.0
        ));
        assert_eq!(sensor.output_current(), before);
        assert_eq!(sensor.temperature(), Some(25.0));
    }

    #[test]
    fn construction_rejects_inverted_or_empty_span() {
        for (min, max) in [(10.0, 10.0), (10.0, -10.0), (f64::NAN, 1.0)] {
            let result = PressureTransmitter::new(
                SimulatedTransmitter::new(),
                CurrentLoopRange::ZeroToTwenty,
                min,
                max,
            );
            assert!(matches!(
                result,
                Err(SensorError::InvalidSpan {
                    kind: SensorKind::Pressure,
                    ..
                })
            ));
        }
    }

    #[test]
    fn current_transmitter_zero_to_twenty() {
        let mut ct = CurrentTransmitter::new(
            SimulatedTransmitter::new(),
            CurrentLoopRange::ZeroToTwenty,
            0.0,
            100.0,
        )
        .unwrap();
        assert_eq!(ct.output_current(), 4.0);
        assert_eq!(ct.set_current(0.0).unwrap(), 0.0);
        assert_eq!(ct.set_current(100.0).unwrap(), 20.0);
    }

    #[test]
    fn out_of_range_message_names_quantity_and_span() {
        let mut sensor = temperature_4_20();
        let msg = sensor.set_temperature(-5.0).unwrap_err().to_string();
        assert_eq!(msg, "temperature -5°C is outside sensor range 0°C to 100°C");
    }

    #[test]
    fn pressure_message_carries_no_unit() {
        // A span in psi
        let mut sensor = PressureTransmitter::new(
            SimulatedTransmitter::new(),
            CurrentLoopRange::FourToTwenty,
            0.0,
            150.0,
        )
        .unwrap();
        let msg = sensor.set_pressure(200.0).unwrap_err().to_string();
        assert_eq!(msg, "pressure 200 is outside sensor range 0 to 150");
    }
}
