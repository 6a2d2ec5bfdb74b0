// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the field-device-emulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Daemon Module
//!
//! The daemon wires the configuration, the field bus, the emulated sensors
//! and the Modbus transport together, and shuts them down cooperatively.
//!
//! ## Components
//!
//! * **Launch Daemon**: starting, monitoring and stopping background tasks
//! * **Sensor Bank**: the configured current loop transmitters, by name
//!
//! ## Usage
//!
//! ```no_run
//! use field_device_emulator::{config::Config, daemon::Daemon};
//!
//! async fn run() -> anyhow::Result<()> {
//!     let config = Config::from_file("config.yaml")?;
//!
//!     let mut daemon = Daemon::new();
//!     daemon.launch(&config).await?;
//!
//!     // Drive a transmitter while the bus is serving
//!     daemon
//!         .sensors()
//!         .lock()
//!         .unwrap()
//!         .set_value("process_temperature", 42.0)?;
//!
//!     tokio::signal::ctrl_c().await?;
//!
//!     daemon.shutdown();
//!     daemon.join().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod launch_daemon;
pub mod sensor_bank;

pub use launch_daemon::Daemon;
pub use sensor_bank::{ConfiguredSensor, SensorBank, SensorBankError, SensorReading};
