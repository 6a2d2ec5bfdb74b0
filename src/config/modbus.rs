// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the field-device-emulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus transport configuration
//!
//! This module defines the structures selecting how the field bus is exposed
//! to Modbus masters: over TCP or over a serial RTU line.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Transport carrying the Modbus frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModbusTransport {
    /// Modbus TCP, the unit identifier selects the device
    #[default]
    Tcp,
    /// Modbus RTU over a serial port, the slave address selects the device
    Rtu,
}

impl fmt::Display for ModbusTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModbusTransport::Tcp => write!(f, "tcp"),
            ModbusTransport::Rtu => write!(f, "rtu"),
        }
    }
}

/// Configuration for the Modbus server front-end.
///
/// # Fields
///
/// * `enabled` - Flag to enable or disable the Modbus server
/// * `transport` - `tcp` or `rtu`
/// * `address` / `port` - TCP binding (default: 127.0.0.1:5020)
/// * `serial_port` / `baud_rate` - RTU line settings (default: /dev/ttyUSB0 at 9600 baud)
///
/// # Example
///
/// ```
/// use field_device_emulator::config::{ModbusConfig, ModbusTransport};
///
/// let modbus_config = ModbusConfig {
///     transport: ModbusTransport::Rtu,
///     serial_port: "/dev/ttyS1".to_string(),
///     ..ModbusConfig::default()
/// };
/// assert!(modbus_config.enabled);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModbusConfig {
    /// When disabled the devices are still emulated but nothing listens.
    pub enabled: bool,

    pub transport: ModbusTransport,

    /// The network address the TCP server binds to.
    ///
    /// Use "0.0.0.0" to bind to all IPv4 interfaces.
    pub address: String,

    /// The TCP port the server listens on. Default is 5020 so that the
    /// emulator runs without privileges; use 502 for the standard port.
    pub port: u16,

    /// Serial device used by the RTU transport.
    pub serial_port: String,

    /// Serial line speed, 8N1 framing.
    pub baud_rate: u32,
}

impl Default for ModbusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            transport: ModbusTransport::Tcp,
            address: "127.0.0.1".to_string(),
            port: 5020,
            serial_port: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
        }
    }
}
