// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the field-device-emulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Emulated Cerus X variable frequency drive
//!
//! ## Register Map
//!
//! Only single-register reads are answered. All values are truncated after
//! scaling.
//!
//! | Register Address | Description | Unit | Scaling |
//! |-----------------|-------------|------|---------|
//! | 8448 | Error code | - | 1 |
//! | 8449 | Operation status | - | 1 |
//! | 8451 | Output frequency | Hz | ×100 (0.01 Hz resolution) |
//! | 8452 | Output current | A | ×10 (0.1 A resolution) |
//! | 8453 | DC bus voltage | V | ×10 (0.1 V resolution) |
//! | 8454 | Output voltage | V | ×10 (0.1 V resolution) |
//! | 8718 | IGBT temperature | °C | ×10 (0.1 °C resolution) |
//! | 8719 | Ambient temperature | °C | ×10 (0.1 °C resolution) |
//! | 8720 | Digital input status | bits | 1 |
//! | 8721 | Digital output status | bits | 1 |
//! | 8739 | Control mode | - | 1 |
//! | 8742 | Drive status | - | 1 |

use std::sync::RwLock;

use log::debug;
use serde::{Deserialize, Serialize};

use super::register_map::{RegisterEntry, RegisterMap};
use super::{BusAddress, ModbusDevice};

/// Holding register addresses of the drive.
///
/// Command registers are listed for reference; the emulator does not accept
/// writes.
pub mod registers {
    pub const RUN_COMMAND: u16 = 8192;
    pub const FREQUENCY_COMMAND: u16 = 8193;
    pub const FAULT_CONTROL_COMMAND: u16 = 8194;

    pub const ERROR_CODE: u16 = 8448;
    pub const OPERATION_STATUS: u16 = 8449;
    pub const FREQUENCY_COMMAND_VALUE: u16 = 8450;
    pub const OUTPUT_FREQUENCY: u16 = 8451;
    pub const OUTPUT_CURRENT: u16 = 8452;
    pub const DC_BUS_VOLTAGE: u16 = 8453;
    pub const OUTPUT_VOLTAGE: u16 = 8454;

    pub const IGBT_TEMPERATURE: u16 = 8718;
    pub const AMBIENT_TEMPERATURE: u16 = 8719;
    pub const DIGITAL_INPUT_STATUS: u16 = 8720;
    pub const DIGITAL_OUTPUT_STATUS: u16 = 8721;
    pub const CONTROL_MODE: u16 = 8739;
    pub const DRIVE_STATUS: u16 = 8742;
}

/// Convert a Fahrenheit reading to Celsius.
pub fn fahrenheit_to_celsius(fahrenheit: f64) -> f64 {
    (fahrenheit - 32.0) * 5.0 / 9.0
}

/// Live attributes of the drive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveState {
    /// Output frequency in Hz
    pub output_frequency: f64,
    /// Output current in amps
    pub output_current: f64,
    /// Ambient temperature in °C
    pub ambient_temperature: f64,
    /// IGBT module temperature in °C
    pub igbt_temperature: f64,
    /// DC bus voltage in volts
    pub dc_bus_voltage: f64,
    /// Output voltage in volts
    pub output_voltage: f64,
    pub drive_status: u16,
    pub error_codes: u16,
    pub operational_status: u16,
    pub control_mode: u16,
    pub digital_input_status: u16,
    pub digital_output_status: u16,
}

impl Default for DriveState {
    fn default() -> Self {
        Self {
            output_frequency: 120.1,
            output_current: 42.2,
            ambient_temperature: fahrenheit_to_celsius(74.0),
            igbt_temperature: fahrenheit_to_celsius(92.6),
            dc_bus_voltage: 413.0,
            output_voltage: 120.1,
            drive_status: 0,
            error_codes: 0,
            operational_status: 0,
            control_mode: 0,
            digital_input_status: 0,
            digital_output_status: 0,
        }
    }
}

const DRIVE_REGISTER_ENTRIES: &[RegisterEntry<DriveState>] = &[
    RegisterEntry {
        address: registers::ERROR_CODE,
        name: "error_code",
        read: |s: &DriveState| f64::from(s.error_codes),
        scale: 1.0,
    },
    RegisterEntry {
        address: registers::OPERATION_STATUS,
        name: "operation_status",
        read: |s: &DriveState| f64::from(s.operational_status),
        scale: 1.0,
    },
    RegisterEntry {
        address: registers::OUTPUT_FREQUENCY,
        name: "output_frequency",
        read: |s: &DriveState| s.output_frequency,
        scale: 100.0,
    },
    RegisterEntry {
        address: registers::OUTPUT_CURRENT,
        name: "output_current",
        read: |s: &DriveState| s.output_current,
        scale: 10.0,
    },
    RegisterEntry {
        address: registers::DC_BUS_VOLTAGE,
        name: "dc_bus_voltage",
        read: |s: &DriveState| s.dc_bus_voltage,
        scale: 10.0,
    },
    RegisterEntry {
        address: registers::OUTPUT_VOLTAGE,
        name: "output_voltage",
        read: |s: &DriveState| s.output_voltage,
        scale: 10.0,
    },
    RegisterEntry {
        address: registers::IGBT_TEMPERATURE,
        name: "igbt_temperature",
        read: |s: &DriveState| s.igbt_temperature,
        scale: 10.0,
    },
    RegisterEntry {
        address: registers::AMBIENT_TEMPERATURE,
        name: "ambient_temperature",
        read: |s: &DriveState| s.ambient_temperature,
        scale: 10.0,
    },
    RegisterEntry {
        address: registers::DIGITAL_INPUT_STATUS,
        name: "digital_input_status",
        read: |s: &DriveState| f64::from(s.digital_input_status),
        scale: 1.0,
    },
    RegisterEntry {
        address: registers::DIGITAL_OUTPUT_STATUS,
        name: "digital_output_status",
        read: |s: &DriveState| f64::from(s.digital_output_status),
        scale: 1.0,
    },
    RegisterEntry {
        address: registers::CONTROL_MODE,
        name: "control_mode",
        read: |s: &DriveState| f64::from(s.control_mode),
        scale: 1.0,
    },
    RegisterEntry {
        address: registers::DRIVE_STATUS,
        name: "drive_status",
        read: |s: &DriveState| f64::from(s.drive_status),
        scale: 1.0,
    },
];

/// Register table shared by every emulated Cerus X drive.
pub const DRIVE_REGISTERS: RegisterMap<DriveState> = RegisterMap::new(DRIVE_REGISTER_ENTRIES);

/// An emulated Cerus X drive answering on one bus address.
///
/// The live attributes sit behind a lock so that application code can update
/// them while the field bus is serving requests.
#[derive(Debug)]
pub struct CerusXDrive {
    bus_address: BusAddress,
    state: RwLock<DriveState>,
}

impl CerusXDrive {
    /// Create a drive with the default nameplate readings.
    pub fn new(bus_address: BusAddress) -> Self {
        Self::with_state(bus_address, DriveState::default())
    }

    pub fn with_state(bus_address: BusAddress, state: DriveState) -> Self {
        Self {
            bus_address,
            state: RwLock::new(state),
        }
    }

    /// Copy of the current live attributes.
    pub fn snapshot(&self) -> DriveState {
        self.read_state().clone()
    }

    /// Mutate the live attributes in place.
    pub fn update<F: FnOnce(&mut DriveState)>(&self, f: F) {
        let mut state = self
            .state
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut state);
        debug!("Drive {} state updated: {:?}", self.bus_address, *state);
    }

    pub fn set_output_current(&self, amps: f64) {
        self.update(|s| s.output_current = amps);
    }

    pub fn set_output_frequency(&self, hertz: f64) {
        self.update(|s| s.output_frequency = hertz);
    }

    pub fn set_ambient_temperature(&self, celsius: f64) {
        self.update(|s| s.ambient_temperature = celsius);
    }

    pub fn set_igbt_temperature(&self, celsius: f64) {
        self.update(|s| s.igbt_temperature = celsius);
    }

    pub fn set_drive_status(&self, status: u16) {
        self.update(|s| s.drive_status = status);
    }

    pub fn set_error_codes(&self, codes: u16) {
        self.update(|s| s.error_codes = codes);
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, DriveState> {
        self.state
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl ModbusDevice for CerusXDrive {
    fn bus_address(&self) -> BusAddress {
        self.bus_address
    }

    fn name(&self) -> &str {
        "Cerus X drive"
    }

    fn read_holding_registers(
        &self,
        start_register: u16,
        count: u16,
    ) -> anyhow::Result<Option<Vec<u16>>> {
        if count != 1 {
            return Ok(None);
        }
        let state = self.read_state();
        Ok(DRIVE_REGISTERS
            .read(&state, start_register)
            .map(|value| vec![value]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_readings_encode_as_documented() {
        let drive = CerusXDrive::new(10);
        let read = |reg| drive.read_holding_registers(reg, 1).unwrap();

        assert_eq!(read(registers::OUTPUT_CURRENT), Some(vec![422]));
        assert_eq!(read(registers::DC_BUS_VOLTAGE), Some(vec![4130]));
        // 74°F = 23.33°C
        assert_eq!(read(registers::AMBIENT_TEMPERATURE), Some(vec![233]));
        // 92.6°F = 33.67°C
        assert_eq!(read(registers::IGBT_TEMPERATURE), Some(vec![336]));
        assert_eq!(read(registers::DRIVE_STATUS), Some(vec![0]));
    }

    #[test]
    fn live_updates_are_visible() {
        let drive = CerusXDrive::new(3);
        drive.set_output_frequency(50.0);
        drive.set_error_codes(0x0012);
        drive.update(|s| s.digital_input_status = 0b1010);

        let read = |reg| drive.read_holding_registers(reg, 1).unwrap();
        assert_eq!(read(registers::OUTPUT_FREQUENCY), Some(vec![5000]));
        assert_eq!(read(registers::ERROR_CODE), Some(vec![0x0012]));
        assert_eq!(read(registers::DIGITAL_INPUT_STATUS), Some(vec![0b1010]));
        assert_eq!(drive.snapshot().output_frequency, 50.0);
    }

    #[test]
    fn unmapped_registers_and_bursts_are_not_found() {
        let drive = CerusXDrive::new(1);
        assert_eq!(drive.read_holding_registers(registers::RUN_COMMAND, 1).unwrap(), None);
        assert_eq!(drive.read_holding_registers(0, 1).unwrap(), None);
        assert_eq!(drive.read_holding_registers(registers::OUTPUT_CURRENT, 2).unwrap(), None);
        assert_eq!(drive.read_holding_registers(registers::OUTPUT_CURRENT, 0).unwrap(), None);
    }

    #[test]
    fn negative_readings_saturate_to_zero() {
        let drive = CerusXDrive::new(1);
        drive.set_ambient_temperature(-12.5);
        assert_eq!(
            drive.read_holding_registers(registers::AMBIENT_TEMPERATURE, 1).unwrap(),
            Some(vec![0])
        );
    }

    #[test]
    fn register_table_has_one_entry_per_address() {
        let mut addresses: Vec<u16> = DRIVE_REGISTERS.addresses().collect();
        let total = addresses.len();
        addresses.sort_unstable();
        addresses.dedup();
        assert_eq!(addresses.len(), total);
        assert_eq!(total, 12);
    }
}
