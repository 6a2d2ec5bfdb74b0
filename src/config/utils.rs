// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the field-device-emulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration utilities
//!
//! This module provides utility functions for working with configuration
//! settings, including validation and schema management.

use std::collections::HashSet;

use anyhow::{Context, Result};
use log::debug;

use super::{Config, ModbusTransport};
use crate::current_loop::validate_span;

/// Lowest unicast slave address on a Modbus serial line.
pub const MIN_BUS_ADDRESS: u8 = 1;
/// Highest unicast slave address on a Modbus serial line.
pub const MAX_BUS_ADDRESS: u8 = 247;

/// Output the embedded JSON schema to the console.
///
/// This function is called when the `--show-config-schema` flag is provided
/// on the command line.
///
/// # Example
///
/// ```bash
/// ./field_device_emulator --show-config-schema > config_schema.json
/// ```
pub fn output_config_schema() -> Result<()> {
    println!("{}", config_schema_pretty()?);
    Ok(())
}

/// The embedded JSON schema, pretty-formatted.
pub fn config_schema_pretty() -> Result<String> {
    let schema_str = include_str!("../../resources/config.schema.json");

    let schema: serde_json::Value =
        serde_json::from_str(schema_str).context("Failed to parse JSON schema")?;

    serde_json::to_string_pretty(&schema).context("Failed to format JSON schema")
}

/// Check if a string is a valid IP address
///
/// Validates that a string represents a valid IPv4 or IPv6 address,
/// or is one of the special values like "localhost" or "0.0.0.0".
pub fn is_valid_ip_address(addr: &str) -> bool {
    if addr.parse::<std::net::IpAddr>().is_ok() {
        return true;
    }

    // Special cases
    matches!(addr, "localhost" | "::" | "::0" | "0.0.0.0")
}

/// Validates the configuration against additional rules that aren't covered by the JSON schema.
///
/// # Validation Rules
///
/// - **Bus addresses**: every device uses a unicast address (1-247) and no
///   two devices share one
/// - **Sensor spans**: `min < max` for every sensor, and `initial`, when
///   given, lies within the span
/// - **Sensor names**: unique and not empty
/// - **TCP binding**: the bind address is a valid IP address and the port is
///   not 0 when the TCP transport is enabled
/// - **RTU line**: the serial port is set and the baud rate is not 0 when the
///   RTU transport is enabled
///
/// # Returns
///
/// * `Ok(())` if all validations pass
/// * `Err(anyhow::Error)` with descriptive message if any validation fails
pub fn validate_specific_rules(config: &Config) -> Result<()> {
    debug!("Performing additional validation checks");

    let mut addresses = HashSet::new();
    for device in &config.devices {
        let address = device.bus_address();
        if !(MIN_BUS_ADDRESS..=MAX_BUS_ADDRESS).contains(&address) {
            anyhow::bail!(
                "Invalid bus address {}: must be between {} and {}",
                address,
                MIN_BUS_ADDRESS,
                MAX_BUS_ADDRESS
            );
        }
        if !addresses.insert(address) {
            anyhow::bail!("Duplicate device bus address: {}", address);
        }
    }

    let mut names = HashSet::new();
    for sensor in &config.sensors {
        if sensor.name.trim().is_empty() {
            anyhow::bail!("Sensor name must not be empty");
        }
        if !names.insert(sensor.name.as_str()) {
            anyhow::bail!("Duplicate sensor name: {}", sensor.name);
        }
        validate_span(sensor.min, sensor.max)
            .with_context(|| format!("Invalid span for sensor {}", sensor.name))?;
        if let Some(initial) = sensor.initial {
            if !(sensor.min..=sensor.max).contains(&initial) {
                anyhow::bail!(
                    "Initial value {} of sensor {} is outside its span [{}, {}]",
                    initial,
                    sensor.name,
                    sensor.min,
                    sensor.max
                );
            }
        }
    }

    if config.modbus.enabled {
        match config.modbus.transport {
            ModbusTransport::Tcp => {
                if config.modbus.port == 0 {
                    anyhow::bail!("Invalid Modbus port number: {}", config.modbus.port);
                }
                if !is_valid_ip_address(&config.modbus.address) {
                    anyhow::bail!("Invalid Modbus bind address: {}", config.modbus.address);
                }
            }
            ModbusTransport::Rtu => {
                if config.modbus.serial_port.trim().is_empty() {
                    anyhow::bail!("Modbus RTU transport requires a serial port");
                }
                if config.modbus.baud_rate == 0 {
                    anyhow::bail!("Invalid Modbus RTU baud rate: 0");
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeviceConfig, SensorConfig};
    use crate::devices::DriveState;

    fn drive(bus_address: u8) -> DeviceConfig {
        DeviceConfig::CerusXDrive {
            bus_address,
            state: DriveState::default(),
        }
    }

    #[test]
    fn default_config_passes() {
        assert!(validate_specific_rules(&Config::default()).is_ok());
    }

    #[test]
    fn bus_addresses_are_checked() {
        let mut config = Config::default();
        config.devices = vec![drive(10), drive(10)];
        let err = validate_specific_rules(&config).unwrap_err();
        assert!(err.to_string().contains("Duplicate device bus address"));

        config.devices = vec![drive(0)];
        assert!(validate_specific_rules(&config).is_err());
        config.devices = vec![drive(248)];
        assert!(validate_specific_rules(&config).is_err());
        config.devices = vec![drive(1), drive(247)];
        assert!(validate_specific_rules(&config).is_ok());
    }

    #[test]
    fn sensor_rules_are_checked() {
        let mut config = Config::default();
        config.sensors = vec![SensorConfig {
            min: 10.0,
            max: 10.0,
            initial: None,
            ..SensorConfig::default()
        }];
        assert!(validate_specific_rules(&config).is_err());

        config.sensors = vec![SensorConfig {
            initial: Some(150.0),
            ..SensorConfig::default()
        }];
        assert!(validate_specific_rules(&config).is_err());

        config.sensors = vec![SensorConfig::default(), SensorConfig::default()];
        let err = validate_specific_rules(&config).unwrap_err();
        assert!(err.to_string().contains("Duplicate sensor name"));
    }

    #[test]
    fn tcp_binding_is_checked_only_when_enabled() {
        let mut config = Config::default();
        config.modbus.address = "not-an-address".to_string();
        assert!(validate_specific_rules(&config).is_err());
        config.modbus.enabled = false;
        assert!(validate_specific_rules(&config).is_ok());
    }

    #[test]
    fn ip_addresses() {
        assert!(is_valid_ip_address("127.0.0.1"));
        assert!(is_valid_ip_address("::1"));
        assert!(is_valid_ip_address("localhost"));
        assert!(!is_valid_ip_address("example"));
    }
}
