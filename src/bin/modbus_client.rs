// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the field-device-emulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use clap::Parser;
use std::error::Error;
use tokio::time::{self, Duration};
use tokio_modbus::prelude::*;

use field_device_emulator::devices::{cerus_x_drive::registers, DRIVE_REGISTERS};

/// How long to wait for the device to answer
const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Modbus client reading holding registers from an emulated field device
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Modbus server address
    #[clap(long, default_value = "127.0.0.1")]
    address: String,

    /// Modbus server port
    #[clap(long, default_value = "5020")]
    port: u16,

    /// Unit identifier (bus address) of the device
    #[clap(long, default_value = "10")]
    unit: u8,

    /// Starting holding register address
    #[clap(long, default_value_t = registers::OUTPUT_CURRENT)]
    register: u16,

    /// Number of registers to read
    #[clap(long, default_value = "1")]
    quantity: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    let args = Args::parse();

    let socket_addr = tokio::net::lookup_host((args.address.as_str(), args.port))
        .await?
        .next()
        .ok_or_else(|| format!("No address found for {}", args.address))?;
    println!(
        "Connecting to Modbus server at {} (unit {})",
        socket_addr, args.unit
    );

    let mut ctx = tcp::connect_slave(socket_addr, Slave(args.unit)).await?;

    println!(
        "Reading {} holding registers starting at address {}",
        args.quantity, args.register
    );
    let response = match time::timeout(
        READ_TIMEOUT,
        ctx.read_holding_registers(args.register, args.quantity),
    )
    .await??
    {
        Ok(values) => values,
        Err(exception) => {
            println!("Device answered with exception: {}", exception);
            return Ok(());
        }
    };

    println!("Raw register values: {:?}", response);

    for (i, value) in response.iter().enumerate() {
        let register = args.register.wrapping_add(i as u16);
        match DRIVE_REGISTERS.lookup(register) {
            Some(entry) if entry.scale > 1.0 => println!(
                "Register {}: {} = {:.2}",
                register,
                entry.name,
                f64::from(*value) / entry.scale
            ),
            Some(entry) => println!("Register {}: {} = {:#06x}", register, entry.name, value),
            None => println!("Register {}: Value = {}", register, value),
        }
    }

    Ok(())
}
