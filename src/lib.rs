// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the field-device-emulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Field device emulator library
//!
//! This library emulates industrial field devices for testing supervisory
//! software without hardware: Modbus slaves answering "read holding
//! registers" on a shared field bus, and 4-20mA / 0-20mA current loop
//! transmitters driven by simulated process values.
//!
//! - [`current_loop`]: range mapping and simulated transmitters
//! - [`devices`]: virtual Modbus devices and their register tables
//! - [`fieldbus`]: device registry and request dispatcher
//! - [`modbus`]: `tokio-modbus` TCP and RTU front-ends
//! - [`config`]: YAML configuration
//! - [`daemon`]: long-running emulator process

pub mod config;
pub mod current_loop;
pub mod daemon;
pub mod devices;
pub mod fieldbus;
pub mod modbus;
