// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the field-device-emulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Current loop sensor configuration

use serde::{Deserialize, Serialize};

use crate::current_loop::{CurrentLoopRange, SensorKind};

/// One emulated current loop transmitter.
///
/// # Example
///
/// ```yaml
/// sensors:
///   - name: tank_pressure
///     kind: pressure
///     loop_range: "4-20"
///     min: 0.0
///     max: 10.0
///     initial: 1.013
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Unique name used to address the sensor at runtime
    pub name: String,

    /// Physical quantity: `temperature`, `pressure` or `current`
    pub kind: SensorKind,

    /// Logical loop span, `"4-20"` unless stated otherwise
    #[serde(default)]
    pub loop_range: CurrentLoopRange,

    /// Sensed value mapped to the bottom of the loop span
    pub min: f64,

    /// Sensed value mapped to 20 mA
    pub max: f64,

    /// Value applied when the daemon starts; the transmitter idles at 4 mA
    /// when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial: Option<f64>,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            name: "process_temperature".to_string(),
            kind: SensorKind::Temperature,
            loop_range: CurrentLoopRange::FourToTwenty,
            min: 0.0,
            max: 100.0,
            initial: Some(25.0),
        }
    }
}
