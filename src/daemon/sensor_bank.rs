// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the field-device-emulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Named collection of the configured current loop transmitters

use log::{debug, info};
use thiserror::Error;

use crate::config::SensorConfig;
use crate::current_loop::{
    CurrentLoopRange, CurrentTransmitter, PressureTransmitter, SensorError, SensorKind,
    SimulatedTransmitter, TemperatureTransmitter,
};

/// Errors raised when addressing sensors by name
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensorBankError {
    #[error("Unknown sensor: {0}")]
    UnknownSensor(String),
    #[error("Duplicate sensor name: {0}")]
    DuplicateName(String),
    #[error("Sensor {name}: {source}")]
    Sensor {
        name: String,
        #[source]
        source: SensorError,
    },
}

/// One configured transmitter, dispatched on its physical quantity.
#[derive(Debug)]
pub enum ConfiguredSensor {
    Temperature(TemperatureTransmitter),
    Pressure(PressureTransmitter),
    Current(CurrentTransmitter),
}

impl ConfiguredSensor {
    /// Build an idle transmitter (4 mA) for the given quantity and span.
    pub fn new(
        kind: SensorKind,
        range: CurrentLoopRange,
        min: f64,
        max: f64,
    ) -> Result<Self, SensorError> {
        let transmitter = SimulatedTransmitter::new();
        Ok(match kind {
            SensorKind::Temperature => ConfiguredSensor::Temperature(TemperatureTransmitter::new(
                transmitter,
                range,
                min,
                max,
            )?),
            SensorKind::Pressure => {
                ConfiguredSensor::Pressure(PressureTransmitter::new(transmitter, range, min, max)?)
            }
            SensorKind::Current => {
                ConfiguredSensor::Current(CurrentTransmitter::new(transmitter, range, min, max)?)
            }
        })
    }

    pub fn kind(&self) -> SensorKind {
        match self {
            ConfiguredSensor::Temperature(_) => SensorKind::Temperature,
            ConfiguredSensor::Pressure(_) => SensorKind::Pressure,
            ConfiguredSensor::Current(_) => SensorKind::Current,
        }
    }

    /// Apply a new sensed value, returning the commanded loop current in mA.
    pub fn set_value(&mut self, value: f64) -> Result<f64, SensorError> {
        match self {
            ConfiguredSensor::Temperature(s) => s.set_temperature(value),
            ConfiguredSensor::Pressure(s) => s.set_pressure(value),
            ConfiguredSensor::Current(s) => s.set_current(value),
        }
    }

    /// Last accepted sensed value.
    pub fn value(&self) -> Option<f64> {
        match self {
            ConfiguredSensor::Temperature(s) => s.temperature(),
            ConfiguredSensor::Pressure(s) => s.pressure(),
            ConfiguredSensor::Current(s) => s.current(),
        }
    }

    pub fn output_current(&self) -> f64 {
        match self {
            ConfiguredSensor::Temperature(s) => s.output_current(),
            ConfiguredSensor::Pressure(s) => s.output_current(),
            ConfiguredSensor::Current(s) => s.output_current(),
        }
    }

    pub fn range(&self) -> CurrentLoopRange {
        match self {
            ConfiguredSensor::Temperature(s) => s.range(),
            ConfiguredSensor::Pressure(s) => s.range(),
            ConfiguredSensor::Current(s) => s.range(),
        }
    }
}

/// Snapshot of one sensor, as logged by the daemon heartbeat
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub name: String,
    pub kind: SensorKind,
    pub value: Option<f64>,
    pub milliamps: f64,
}

/// The transmitters of a running emulator, addressed by name.
///
/// Sensors keep their configuration order.
#[derive(Debug, Default)]
pub struct SensorBank {
    sensors: Vec<(String, ConfiguredSensor)>,
}

impl SensorBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every configured sensor and apply its initial value.
    pub fn from_configs(configs: &[SensorConfig]) -> Result<Self, SensorBankError> {
        let mut bank = Self::new();
        for config in configs {
            let sensor = ConfiguredSensor::new(config.kind, config.loop_range, config.min, config.max)
                .map_err(|source| SensorBankError::Sensor {
                    name: config.name.clone(),
                    source,
                })?;
            bank.insert(config.name.clone(), sensor)?;
            if let Some(initial) = config.initial {
                bank.set_value(&config.name, initial)?;
            }
            info!(
                "Sensor {} ({}, {} {}{unit} to {}{unit}) ready",
                config.name,
                config.kind,
                config.loop_range,
                config.min,
                config.max,
                unit = config.kind.unit()
            );
        }
        Ok(bank)
    }

    /// Add a sensor under a new name.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        sensor: ConfiguredSensor,
    ) -> Result<(), SensorBankError> {
        let name = name.into();
        if self.get(&name).is_some() {
            return Err(SensorBankError::DuplicateName(name));
        }
        self.sensors.push((name, sensor));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ConfiguredSensor> {
        self.sensors
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, sensor)| sensor)
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut ConfiguredSensor, SensorBankError> {
        self.sensors
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, sensor)| sensor)
            .ok_or_else(|| SensorBankError::UnknownSensor(name.to_string()))
    }

    /// Set the sensed value of the named sensor.
    ///
    /// ### Returns
    ///
    /// The loop current now driven by the sensor, in mA. A rejected value
    /// leaves the previous current in place.
    pub fn set_value(&mut self, name: &str, value: f64) -> Result<f64, SensorBankError> {
        let sensor = self.get_mut(name)?;
        let milliamps = sensor
            .set_value(value)
            .map_err(|source| SensorBankError::Sensor {
                name: name.to_string(),
                source,
            })?;
        debug!("Sensor {} set to {} -> {:.3} mA", name, value, milliamps);
        Ok(milliamps)
    }

    /// Loop current of the named sensor, in mA.
    pub fn output_current(&self, name: &str) -> Option<f64> {
        self.get(name).map(ConfiguredSensor::output_current)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sensors.iter().map(|(name, _)| name.as_str())
    }

    pub fn readings(&self) -> Vec<SensorReading> {
        self.sensors
            .iter()
            .map(|(name, sensor)| SensorReading {
                name: name.clone(),
                kind: sensor.kind(),
                value: sensor.value(),
                milliamps: sensor.output_current(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }
}
