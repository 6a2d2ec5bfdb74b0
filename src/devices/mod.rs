// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the field-device-emulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Virtual Modbus devices
//!
//! Every emulated device answers holding register reads for its own bus
//! address through the [`ModbusDevice`] trait. The field bus only depends on
//! this capability, never on a concrete device type.
//!
//! - [`register_map`]: static register tables (address, attribute, scale)
//! - [`cerus_x_drive`]: Cerus X variable frequency drive

pub mod cerus_x_drive;
pub mod register_map;

pub use cerus_x_drive::{fahrenheit_to_celsius, CerusXDrive, DriveState, DRIVE_REGISTERS};
pub use register_map::{encode_scaled, RegisterEntry, RegisterMap};

/// Slave identifier of a device on the field bus.
pub type BusAddress = u8;

/// Capability of answering "read holding registers" requests.
pub trait ModbusDevice: Send + Sync {
    /// Bus address the device answers on. Fixed for the device lifetime.
    fn bus_address(&self) -> BusAddress;

    /// Short human readable device name used in logs.
    fn name(&self) -> &str;

    /// Read `count` holding registers starting at `start_register`.
    ///
    /// ### Returns
    ///
    /// * `Ok(Some(values))` with the encoded registers
    /// * `Ok(None)` when the registers are not mapped on this device; this is
    ///   the normal answer to bus scanning and is not an error
    /// * `Err(_)` when the device failed to compute its live values
    fn read_holding_registers(
        &self,
        start_register: u16,
        count: u16,
    ) -> anyhow::Result<Option<Vec<u16>>>;
}
