// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the field-device-emulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration management for the field device emulator
//!
//! This module provides functionality for loading, validating, and applying
//! configuration settings. The configuration is backed by a YAML file and
//! validated against a JSON schema for robustness.
//!
//! ## Configuration Structure
//!
//! - `modbus`: how the field bus is exposed (TCP or RTU)
//! - `devices`: the virtual Modbus devices answering on the bus
//! - `sensors`: the emulated current loop transmitters
//!
//! ## Usage
//!
//! ```no_run
//! use field_device_emulator::config::{Config, ModbusTransport};
//! use std::path::Path;
//!
//! // Load config from file, creates a default if not found
//! let mut config = Config::from_file(Path::new("config.yaml")).unwrap();
//!
//! // Apply command line overrides if needed
//! config.apply_args(
//!     Some(true),                  // Enable Modbus
//!     Some("0.0.0.0".to_string()), // Modbus address
//!     Some(502),                   // Modbus port
//!     Some(ModbusTransport::Tcp),  // Transport
//!     None,                        // Serial port
//!     None,                        // Baud rate
//! );
//!
//! println!("Modbus port: {}", config.modbus.port);
//! ```

pub mod devices;
pub mod modbus;
pub mod sensors;
pub mod utils;

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, error};
use serde::{Deserialize, Serialize};

pub use devices::DeviceConfig;
pub use modbus::{ModbusConfig, ModbusTransport};
pub use sensors::SensorConfig;
pub use utils::{is_valid_ip_address, output_config_schema, validate_specific_rules};

/// Root configuration structure for the emulator.
///
/// Every section falls back to its default when missing from the file, so
/// an empty document describes one drive at bus address 10 and one
/// temperature transmitter served over Modbus TCP on 127.0.0.1:5020.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Modbus front-end settings.
    #[serde(default)]
    pub modbus: ModbusConfig,

    /// Virtual devices registered on the field bus at startup.
    #[serde(default = "default_devices")]
    pub devices: Vec<DeviceConfig>,

    /// Current loop transmitters created at startup.
    #[serde(default = "default_sensors")]
    pub sensors: Vec<SensorConfig>,
}

fn default_devices() -> Vec<DeviceConfig> {
    vec![DeviceConfig::default()]
}

fn default_sensors() -> Vec<SensorConfig> {
    vec![SensorConfig::default()]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            modbus: ModbusConfig::default(),
            devices: default_devices(),
            sensors: default_sensors(),
        }
    }
}

impl Config {
    /// Helper method to create a sample config file when validation fails
    fn create_sample_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        let sample_path = path.with_extension("sample.yaml");
        debug!("Original path: {:?}, Sample path: {:?}", path, sample_path);

        if let Some(parent) = sample_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                debug!("Creating parent directory: {:?}", parent);
                fs::create_dir_all(parent).with_context(|| {
                    format!(
                        "Failed to create parent directory for sample config at {:?}",
                        parent
                    )
                })?;
            }
        }

        Self::default()
            .save_to_file(&sample_path)
            .with_context(|| format!("Failed to save sample config to {:?}", sample_path))?;

        error!(
            "Sample configuration file created at {:?}\nPlease edit and rename it",
            sample_path
        );
        Ok(())
    }

    /// Load configuration from a file
    ///
    /// A missing file is created with the default configuration. A file that
    /// fails schema validation, deserialization or [`validate_specific_rules`]
    /// is left untouched; a `<name>.sample.yaml` with the defaults is written
    /// next to it and an error is returned.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(
                "Configuration file not found at {:?}, creating default",
                path
            );
            let default_config = Self::default();
            default_config.save_to_file(path)?;
            return Ok(default_config);
        }

        debug!("Loading configuration from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;

        let yaml_value: serde_yml::Value = serde_yml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML configuration from {:?}", path))?;

        let json_value = serde_json::to_value(&yaml_value).with_context(|| {
            format!("Failed to convert YAML to JSON for validation: {:?}", path)
        })?;

        let schema_str = include_str!("../../resources/config.schema.json");
        let schema: serde_json::Value =
            serde_json::from_str(schema_str).context("Failed to parse JSON schema")?;

        let validator = jsonschema::draft202012::options()
            .should_validate_formats(true)
            .build(&schema)?;

        debug!("Validating {} configuration against schema", path.display());
        if let Err(error) = validator.validate(&json_value) {
            error!("Configuration validation error before deserialization");
            Self::create_sample_config(path)?;
            anyhow::bail!("Configuration validation failed: {}", error);
        }

        debug!("Schema validation passed, deserializing into Config structure");
        let config: Config = match serde_yml::from_str(&contents) {
            Ok(config) => config,
            Err(err) => {
                error!("Configuration deserialization error: {}", err);
                if let Err(e) = Self::create_sample_config(path) {
                    error!("Failed to create sample config: {}", e);
                }
                return Err(anyhow::anyhow!(
                    "Failed to deserialize configuration from {}: {}",
                    path.display(),
                    err
                ));
            }
        };

        if let Err(err) = validate_specific_rules(&config) {
            error!("Configuration specific validation error: {:#}", err);
            Self::create_sample_config(path)?;
            return Err(err);
        }

        Ok(config)
    }

    /// Save the configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml =
            serde_yml::to_string(self).context("Failed to serialize configuration to YAML")?;

        let mut file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create config file at {:?}", path.as_ref()))?;

        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Apply command line arguments to override configuration values.
    ///
    /// Only the values explicitly provided override the loaded configuration.
    ///
    /// # Parameters
    ///
    /// * `modbus_enabled` - Optional flag to enable/disable the Modbus server
    /// * `modbus_address` - Optional bind address of the TCP server
    /// * `modbus_port` - Optional TCP port of the server
    /// * `transport` - Optional transport selection
    /// * `serial_port` - Optional serial device for the RTU transport
    /// * `baud_rate` - Optional RTU line speed
    pub fn apply_args(
        &mut self,
        modbus_enabled: Option<bool>,
        modbus_address: Option<String>,
        modbus_port: Option<u16>,
        transport: Option<ModbusTransport>,
        serial_port: Option<String>,
        baud_rate: Option<u32>,
    ) {
        if let Some(enabled) = modbus_enabled {
            debug!("Overriding Modbus enabled from command line: {}", enabled);
            self.modbus.enabled = enabled;
        }
        if let Some(address) = modbus_address {
            debug!("Overriding Modbus address from command line: {}", address);
            self.modbus.address = address;
        }
        if let Some(port) = modbus_port {
            debug!("Overriding Modbus port from command line: {}", port);
            self.modbus.port = port;
        }
        if let Some(transport) = transport {
            debug!("Overriding Modbus transport from command line: {}", transport);
            self.modbus.transport = transport;
        }
        if let Some(serial_port) = serial_port {
            debug!("Overriding serial port from command line: {}", serial_port);
            self.modbus.serial_port = serial_port;
        }
        if let Some(baud_rate) = baud_rate {
            debug!("Overriding baud rate from command line: {}", baud_rate);
            self.modbus.baud_rate = baud_rate;
        }
    }
}
