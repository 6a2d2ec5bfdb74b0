// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the field-device-emulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Emulated device configuration
//!
//! Each entry of the `devices` section creates one virtual device on the
//! field bus. Entries are tagged by `type`:
//!
//! ```yaml
//! devices:
//!   - type: cerus_x_drive
//!     bus_address: 10
//!     state:
//!       output_current: 42.2
//!       output_frequency: 60.0
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::devices::{BusAddress, CerusXDrive, DriveState, ModbusDevice};

/// One virtual device on the field bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeviceConfig {
    /// Cerus X variable frequency drive
    CerusXDrive {
        bus_address: BusAddress,
        /// Initial live attributes, missing fields take the nameplate defaults
        #[serde(default)]
        state: DriveState,
    },
}

impl DeviceConfig {
    pub fn bus_address(&self) -> BusAddress {
        match self {
            DeviceConfig::CerusXDrive { bus_address, .. } => *bus_address,
        }
    }

    /// Instantiate the configured device.
    pub fn build(&self) -> Arc<dyn ModbusDevice> {
        match self {
            DeviceConfig::CerusXDrive { bus_address, state } => {
                Arc::new(CerusXDrive::with_state(*bus_address, state.clone()))
            }
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig::CerusXDrive {
            bus_address: 10,
            state: DriveState::default(),
        }
    }
}
