// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the field-device-emulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus transport module
//!
//! This module exposes the [`FieldBus`](crate::fieldbus::FieldBus) to real
//! Modbus masters through `tokio-modbus`, either over TCP (the unit identifier
//! selects the device) or over a serial RTU line.
//!
//! ## Key Components
//!
//! - `FieldBusService`: the `tokio-modbus` service routing read holding
//!   registers requests to the field bus dispatcher.
//! - `serve_tcp` / `serve_rtu`: serving loops stopped by a shared running flag.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::{atomic::AtomicBool, Arc};
//! use field_device_emulator::devices::CerusXDrive;
//! use field_device_emulator::fieldbus::FieldBus;
//! use field_device_emulator::modbus::serve_tcp;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let bus = Arc::new(FieldBus::new());
//! bus.add(Arc::new(CerusXDrive::new(10)))?;
//! bus.connect();
//! let running = Arc::new(AtomicBool::new(true));
//! serve_tcp(bus, "127.0.0.1:5020".parse()?, running).await?;
//! # Ok(())
//! # }
//! ```

pub mod modbus_server;
pub use modbus_server::{serve_rtu, serve_tcp, serve_tcp_listener, FieldBusService};
