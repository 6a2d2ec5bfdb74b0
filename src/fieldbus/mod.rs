// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the field-device-emulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Field bus registry and request dispatcher
//!
//! The [`FieldBus`] owns every emulated device keyed by bus address, tracks
//! whether the bus is connected to its transport, and turns decoded
//! "read holding registers" requests into register values or one of the
//! three protocol exceptions understood by Modbus masters.
//!
//! ## Dispatch rules
//!
//! 1. `count == 0` or `count > 125` → [`ProtocolError::IllegalDataValue`]
//! 2. unknown bus address → [`ProtocolError::IllegalDataAddress`]
//! 3. device answers "not mapped", or a register count different from the
//!    request → [`ProtocolError::IllegalDataAddress`]
//! 4. device error or panic → [`ProtocolError::DeviceFailure`]
//!
//! ## Thread Safety
//!
//! The registry is an insert-only map behind an `RwLock`. Devices can be
//! added while requests are being served; an occupied address is never
//! rebound.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, error, info, warn};
use thiserror::Error;

use crate::devices::{BusAddress, ModbusDevice};

/// Largest register burst a Modbus read request may ask for.
pub const MAX_READ_REGISTERS: u16 = 125;

/// Exception returned to the Modbus master.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolError {
    #[error("Illegal data address")]
    IllegalDataAddress,
    #[error("Illegal data value")]
    IllegalDataValue,
    #[error("Device failure")]
    DeviceFailure,
}

impl ProtocolError {
    /// Standard Modbus exception code.
    pub fn code(self) -> u8 {
        match self {
            ProtocolError::IllegalDataAddress => 0x02,
            ProtocolError::IllegalDataValue => 0x03,
            ProtocolError::DeviceFailure => 0x04,
        }
    }
}

impl From<ProtocolError> for tokio_modbus::ExceptionCode {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::IllegalDataAddress => tokio_modbus::ExceptionCode::IllegalDataAddress,
            ProtocolError::IllegalDataValue => tokio_modbus::ExceptionCode::IllegalDataValue,
            ProtocolError::DeviceFailure => tokio_modbus::ExceptionCode::ServerDeviceFailure,
        }
    }
}

/// Errors raised when managing the field bus registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldBusError {
    #[error("Device already exists at bus address {0}")]
    DuplicateAddress(BusAddress),
}

/// Connection state of the bus towards its transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

/// Registry of emulated devices sharing one bus
pub struct FieldBus {
    devices: RwLock<HashMap<BusAddress, Arc<dyn ModbusDevice>>>,
    connected: AtomicBool,
}

impl Default for FieldBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FieldBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldBus")
            .field("addresses", &self.addresses())
            .field("state", &self.state())
            .finish()
    }
}

impl FieldBus {
    /// Create an empty, disconnected bus.
    pub fn new() -> Self {
        Self {
            devices: RwLock::new(HashMap::new()),
            connected: AtomicBool::new(false),
        }
    }

    /// Register a device at its bus address.
    ///
    /// ### Errors
    ///
    /// [`FieldBusError::DuplicateAddress`] if the address is already taken;
    /// the registered device is left in place.
    pub fn add(&self, device: Arc<dyn ModbusDevice>) -> Result<(), FieldBusError> {
        let address = device.bus_address();
        let mut devices = self.devices.write().unwrap_or_else(PoisonError::into_inner);
        if devices.contains_key(&address) {
            warn!(
                "Refusing to register {} at bus address {}: address in use",
                device.name(),
                address
            );
            return Err(FieldBusError::DuplicateAddress(address));
        }
        info!("Registered {} at bus address {}", device.name(), address);
        devices.insert(address, device);
        Ok(())
    }

    /// Look up the device answering at `address`.
    pub fn device(&self, address: BusAddress) -> Option<Arc<dyn ModbusDevice>> {
        self.devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&address)
            .cloned()
    }

    /// Sorted snapshot of the occupied bus addresses.
    pub fn addresses(&self) -> Vec<BusAddress> {
        let mut addresses: Vec<BusAddress> = self
            .devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        addresses.sort_unstable();
        addresses
    }

    pub fn len(&self) -> usize {
        self.devices.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start accepting requests from the transport.
    pub fn connect(&self) {
        if self.connected.swap(true, Ordering::SeqCst) {
            debug!("Field bus already connected");
        } else {
            info!("Field bus connected with {} device(s)", self.len());
        }
    }

    /// Stop accepting requests from the transport.
    pub fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            info!("Field bus disconnected");
        }
    }

    pub fn state(&self) -> ConnectionState {
        if self.is_connected() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Answer a "read holding registers" request.
    ///
    /// Never panics and never propagates a device fault: every failure is
    /// reported as a [`ProtocolError`].
    pub fn handle_read_holding_registers(
        &self,
        address: BusAddress,
        start_register: u16,
        count: u16,
    ) -> Result<Vec<u16>, ProtocolError> {
        debug!(
            "Read holding registers request: address={}, start={}, count={}",
            address, start_register, count
        );

        if count == 0 || count > MAX_READ_REGISTERS {
            return Err(ProtocolError::IllegalDataValue);
        }

        let Some(device) = self.device(address) else {
            debug!("No device at bus address {}", address);
            return Err(ProtocolError::IllegalDataAddress);
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            device.read_holding_registers(start_register, count)
        }));

        match outcome {
            Ok(Ok(Some(values))) if values.len() == usize::from(count) => Ok(values),
            Ok(Ok(Some(values))) => {
                debug!(
                    "{} at {} returned {} register(s) for a request of {}",
                    device.name(),
                    address,
                    values.len(),
                    count
                );
                Err(ProtocolError::IllegalDataAddress)
            }
            Ok(Ok(None)) => Err(ProtocolError::IllegalDataAddress),
            Ok(Err(err)) => {
                error!(
                    "{} at bus address {} failed: {:#}",
                    device.name(),
                    address,
                    err
                );
                Err(ProtocolError::DeviceFailure)
            }
            Err(_) => {
                error!(
                    "{} at bus address {} panicked while reading register {}",
                    device.name(),
                    address,
                    start_register
                );
                Err(ProtocolError::DeviceFailure)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::CerusXDrive;

    struct EchoDevice {
        address: BusAddress,
    }

    impl ModbusDevice for EchoDevice {
        fn bus_address(&self) -> BusAddress {
            self.address
        }

        fn name(&self) -> &str {
            "echo"
        }

        fn read_holding_registers(
            &self,
            start_register: u16,
            count: u16,
        ) -> anyhow::Result<Option<Vec<u16>>> {
            Ok(Some((0..count).map(|i| start_register + i).collect()))
        }
    }

    #[test]
    fn exception_codes_match_modbus() {
        assert_eq!(ProtocolError::IllegalDataAddress.code(), 0x02);
        assert_eq!(ProtocolError::IllegalDataValue.code(), 0x03);
        assert_eq!(ProtocolError::DeviceFailure.code(), 0x04);
        assert_eq!(
            tokio_modbus::ExceptionCode::from(ProtocolError::DeviceFailure),
            tokio_modbus::ExceptionCode::ServerDeviceFailure
        );
    }

    #[test]
    fn burst_limit_is_inclusive() {
        let bus = FieldBus::new();
        bus.add(Arc::new(EchoDevice { address: 4 })).unwrap();
        assert_eq!(bus.handle_read_holding_registers(4, 0, 125).unwrap().len(), 125);
        assert_eq!(
            bus.handle_read_holding_registers(4, 0, 126),
            Err(ProtocolError::IllegalDataValue)
        );
    }

    #[test]
    fn count_is_checked_before_address() {
        let bus = FieldBus::new();
        assert_eq!(
            bus.handle_read_holding_registers(99, 0, 0),
            Err(ProtocolError::IllegalDataValue)
        );
    }

    #[test]
    fn connection_state_transitions() {
        let bus = FieldBus::new();
        assert_eq!(bus.state(), ConnectionState::Disconnected);
        bus.connect();
        bus.connect();
        assert_eq!(bus.state(), ConnectionState::Connected);
        bus.disconnect();
        assert!(!bus.is_connected());
    }

    #[test]
    fn registration_is_allowed_in_both_states() {
        let bus = FieldBus::new();
        bus.add(Arc::new(CerusXDrive::new(1))).unwrap();
        bus.connect();
        bus.add(Arc::new(CerusXDrive::new(2))).unwrap();
        assert_eq!(bus.addresses(), vec![1, 2]);
        assert_eq!(bus.len(), 2);
        assert!(!bus.is_empty());
    }
}
