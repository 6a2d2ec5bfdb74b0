// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the field-device-emulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! End-to-end tests of the emulator daemon

use std::time::Duration;

use approx::assert_abs_diff_eq;
use tokio::net::TcpListener;
use tokio::time;
use tokio_modbus::prelude::*;

use field_device_emulator::config::{Config, DeviceConfig, SensorConfig};
use field_device_emulator::current_loop::{CurrentLoopRange, SensorKind};
use field_device_emulator::daemon::{Daemon, SensorBankError};
use field_device_emulator::devices::{cerus_x_drive::registers, DriveState};
use field_device_emulator::fieldbus::ConnectionState;

fn test_config() -> Config {
    let mut config = Config::default();
    // Let the OS pick a free port
    config.modbus.port = 0;
    config.devices.push(DeviceConfig::CerusXDrive {
        bus_address: 20,
        state: DriveState {
            output_frequency: 50.0,
            ..DriveState::default()
        },
    });
    config.sensors.push(SensorConfig {
        name: "supply_pressure".to_string(),
        kind: SensorKind::Pressure,
        loop_range: CurrentLoopRange::ZeroToTwenty,
        min: 0.0,
        max: 16.0,
        initial: Some(4.0),
    });
    config
}

#[tokio::test]
async fn test_daemon_serves_configured_devices() -> Result<(), Box<dyn std::error::Error>> {
    let mut daemon = Daemon::new();
    daemon.launch(&test_config()).await?;
    assert_eq!(daemon.field_bus().state(), ConnectionState::Connected);
    assert_eq!(daemon.field_bus().addresses(), vec![10, 20]);

    let socket_addr = daemon
        .modbus_local_addr()
        .ok_or("Modbus server did not start")?;
    time::sleep(Duration::from_millis(100)).await;

    let mut ctx = tcp::connect_slave(socket_addr, Slave(20)).await?;
    let data = ctx
        .read_holding_registers(registers::OUTPUT_FREQUENCY, 1)
        .await??;
    assert_eq!(data, vec![5000]);
    ctx.disconnect().await?;

    daemon.shutdown();
    assert_eq!(daemon.field_bus().state(), ConnectionState::Disconnected);
    time::timeout(Duration::from_secs(15), daemon.join()).await??;
    Ok(())
}

#[tokio::test]
async fn test_daemon_sensors_are_driven_by_name() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = test_config();
    config.modbus.enabled = false;

    let mut daemon = Daemon::new();
    daemon.launch(&config).await?;
    assert!(daemon.modbus_local_addr().is_none());

    let sensors = daemon.sensors();
    {
        let mut bank = sensors.lock().unwrap();
        // Initial values from the configuration
        assert_abs_diff_eq!(bank.output_current("process_temperature").unwrap(), 8.0);
        assert_abs_diff_eq!(bank.output_current("supply_pressure").unwrap(), 5.0);

        assert_abs_diff_eq!(bank.set_value("supply_pressure", 8.0)?, 10.0);
        assert!(matches!(
            bank.set_value("supply_pressure", 17.0),
            Err(SensorBankError::Sensor { .. })
        ));
        assert_abs_diff_eq!(bank.output_current("supply_pressure").unwrap(), 10.0);
    }

    daemon.shutdown();
    time::timeout(Duration::from_secs(15), daemon.join()).await??;
    Ok(())
}

#[tokio::test]
async fn test_daemon_refuses_duplicate_devices() {
    let mut config = test_config();
    config.modbus.enabled = false;
    config.devices.push(DeviceConfig::default());

    let mut daemon = Daemon::new();
    let err = daemon.launch(&config).await.unwrap_err();
    assert!(format!("{err:#}").contains("Device already exists at bus address 10"));
}

#[tokio::test]
async fn test_failed_transport_leaves_daemon_retryable() -> Result<(), Box<dyn std::error::Error>>
{
    // Hold a port so that the daemon cannot bind it
    let busy = TcpListener::bind("127.0.0.1:0").await?;
    let mut config = test_config();
    config.modbus.port = busy.local_addr()?.port();

    let mut daemon = Daemon::new();
    let err = daemon.launch(&config).await.unwrap_err();
    assert!(format!("{err:#}").contains("Failed to bind Modbus server"));
    assert_eq!(daemon.field_bus().state(), ConnectionState::Disconnected);
    assert!(daemon.field_bus().addresses().is_empty());
    assert!(daemon.modbus_local_addr().is_none());

    config.modbus.port = 0;
    daemon.launch(&config).await?;
    assert_eq!(daemon.field_bus().state(), ConnectionState::Connected);
    assert_eq!(daemon.field_bus().addresses(), vec![10, 20]);
    assert!(daemon.modbus_local_addr().is_some());

    daemon.shutdown();
    time::timeout(Duration::from_secs(15), daemon.join()).await??;
    Ok(())
}
