// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the field-device-emulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, PoisonError,
};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, error, info};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time;

use super::sensor_bank::SensorBank;
use crate::config::{Config, ModbusTransport};
use crate::fieldbus::FieldBus;
use crate::modbus::{serve_rtu, serve_tcp_listener};

/// Period between two heartbeat log lines.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

/// Represents a daemon task that can be started and managed
pub struct Daemon {
    tasks: Vec<JoinHandle<Result<()>>>,
    running: Arc<AtomicBool>,
    field_bus: Arc<FieldBus>,
    sensors: Arc<Mutex<SensorBank>>,
    modbus_local_addr: Option<SocketAddr>,
}

impl Default for Daemon {
    fn default() -> Self {
        Self::new()
    }
}

impl Daemon {
    /// Create a new daemon instance with an empty, disconnected bus
    pub fn new() -> Self {
        Daemon {
            tasks: Vec::new(),
            running: Arc::new(AtomicBool::new(true)),
            field_bus: Arc::new(FieldBus::new()),
            sensors: Arc::new(Mutex::new(SensorBank::new())),
            modbus_local_addr: None,
        }
    }

    /// Launch all configured tasks based on configuration
    ///
    /// Registers the configured devices on a fresh bus and builds the sensors
    /// with their initial values, then starts the Modbus server (when
    /// enabled). Only once the transport is up does the daemon adopt the new
    /// bus and sensors, connect the bus and start the heartbeat. A failed
    /// launch leaves the daemon untouched, so it can be retried.
    pub async fn launch(&mut self, config: &Config) -> Result<()> {
        let field_bus = Arc::new(FieldBus::new());
        for device in &config.devices {
            field_bus.add(device.build()).with_context(|| {
                format!(
                    "Failed to register device at bus address {}",
                    device.bus_address()
                )
            })?;
        }

        let bank = SensorBank::from_configs(&config.sensors)
            .context("Failed to build configured sensors")?;

        if config.modbus.enabled {
            self.start_modbus_server(config, &field_bus).await?;
        } else {
            info!("Modbus server disabled, devices are emulated without a transport");
        }

        field_bus.connect();
        self.field_bus = field_bus;
        *self.sensors.lock().unwrap_or_else(PoisonError::into_inner) = bank;

        self.start_heartbeat()?;

        Ok(())
    }

    /// Start the Modbus server for `bus` on the configured transport
    async fn start_modbus_server(&mut self, config: &Config, bus: &Arc<FieldBus>) -> Result<()> {
        let bus = Arc::clone(bus);
        let running = Arc::clone(&self.running);

        let task = match config.modbus.transport {
            ModbusTransport::Tcp => {
                info!(
                    "Starting modbus server on {}:{}",
                    config.modbus.address, config.modbus.port
                );
                let socket_addr = tokio::net::lookup_host((
                    config.modbus.address.as_str(),
                    config.modbus.port,
                ))
                .await
                .with_context(|| format!("Failed to resolve {}", config.modbus.address))?
                .next()
                .with_context(|| format!("No address found for {}", config.modbus.address))?;

                // Bind here so that a busy port fails the launch
                let listener = TcpListener::bind(socket_addr)
                    .await
                    .with_context(|| format!("Failed to bind Modbus server to {}", socket_addr))?;
                self.modbus_local_addr = Some(listener.local_addr()?);

                tokio::spawn(serve_tcp_listener(bus, listener, running))
            }
            ModbusTransport::Rtu => {
                info!(
                    "Starting modbus RTU server on {} at {} baud",
                    config.modbus.serial_port, config.modbus.baud_rate
                );
                let serial_port = config.modbus.serial_port.clone();
                let baud_rate = config.modbus.baud_rate;
                tokio::spawn(async move { serve_rtu(bus, &serial_port, baud_rate, running).await })
            }
        };

        self.tasks.push(task);
        Ok(())
    }

    /// Start a heartbeat task that logs the bus state and every loop current
    fn start_heartbeat(&mut self) -> Result<()> {
        debug!("Starting heartbeat monitor");

        let running = Arc::clone(&self.running);
        let bus = Arc::clone(&self.field_bus);
        let sensors = Arc::clone(&self.sensors);
        let task = tokio::spawn(async move {
            let mut ticker = time::interval(Duration::from_secs(1));
            let mut elapsed = HEARTBEAT_INTERVAL;
            while running.load(Ordering::SeqCst) {
                if elapsed >= HEARTBEAT_INTERVAL {
                    elapsed = Duration::ZERO;
                    debug!(
                        "Daemon heartbeat: bus {} with devices {:?}",
                        bus.state(),
                        bus.addresses()
                    );
                    let readings = sensors
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .readings();
                    for reading in readings {
                        debug!(
                            "  {} ({}): {:?} -> {:.3} mA",
                            reading.name, reading.kind, reading.value, reading.milliamps
                        );
                    }
                }
                ticker.tick().await;
                elapsed += Duration::from_secs(1);
            }
            Ok(())
        });

        self.tasks.push(task);
        Ok(())
    }

    /// The field bus shared with the Modbus server
    pub fn field_bus(&self) -> Arc<FieldBus> {
        Arc::clone(&self.field_bus)
    }

    /// The configured sensors, shared with the heartbeat
    pub fn sensors(&self) -> Arc<Mutex<SensorBank>> {
        Arc::clone(&self.sensors)
    }

    /// Address actually bound by the Modbus TCP server, if one is running
    pub fn modbus_local_addr(&self) -> Option<SocketAddr> {
        self.modbus_local_addr
    }

    /// Stop all running tasks and disconnect the bus
    pub fn shutdown(&self) {
        info!("Shutting down daemon tasks");
        self.running.store(false, Ordering::SeqCst);
        self.field_bus.disconnect();
    }

    /// Wait for all tasks to complete
    pub async fn join(self) -> Result<()> {
        for task in self.tasks {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Task failed: {:#}", e),
                Err(e) => error!("Task panicked: {}", e),
            }
        }
        Ok(())
    }
}
