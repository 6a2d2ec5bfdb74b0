// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the field-device-emulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus server front-end of the field bus
//!
//! For avoiding confusion with the Modbus master/slave terminology, this module uses
//! the terms "server" and "client" instead. The server is the emulator answering
//! for every virtual device on the bus, while the client is the supervisory
//! software under test polling them.
//!
//! The unit identifier (TCP) or slave address (RTU) of each request selects the
//! virtual device. Framing, CRC and exception encoding are handled by
//! `tokio-modbus`; this module only routes decoded requests to the [`FieldBus`].
//!
//! ## Usage Example
//!
//! See `src/bin/modbus_client.rs` for a client polling a running emulator.

use std::{
    future, io,
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use tokio::io::DuplexStream;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio::time;
use tokio_modbus::{
    server::tcp::{accept_tcp_connection, Server},
    ExceptionCode, Request, Response, SlaveRequest,
};

use crate::fieldbus::{FieldBus, ProtocolError};

/// How long the serving loops wait for the server task after a stop request.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
/// Polling period of the shared running flag.
const RUNNING_POLL_INTERVAL: Duration = Duration::from_millis(200);
/// Buffer of the in-memory pipe between a client socket and its Modbus session.
const BRIDGE_BUFFER_SIZE: usize = 1024;

/// `tokio-modbus` service routing requests to a shared [`FieldBus`].
///
/// One instance is created per client connection; all instances share the
/// same bus and therefore the same device registry.
#[derive(Clone)]
pub struct FieldBusService {
    bus: Arc<FieldBus>,
}

impl FieldBusService {
    pub fn new(bus: Arc<FieldBus>) -> Self {
        Self { bus }
    }

    /// Route one decoded request.
    ///
    /// Only "read holding registers" (0x03) is answered; any other function
    /// code gets an `IllegalFunction` exception. Requests reaching a
    /// disconnected bus are refused with a device failure.
    pub fn handle(&self, req: SlaveRequest<'_>) -> Result<Response, ExceptionCode> {
        let SlaveRequest { slave, request } = req;

        if !self.bus.is_connected() {
            warn!(
                "Field bus disconnected, refusing request for slave {}: {:?}",
                slave, request
            );
            return Err(ProtocolError::DeviceFailure.into());
        }

        match request {
            Request::ReadHoldingRegisters(addr, cnt) => {
                debug!(
                    "Reading {} holding registers starting from address {} on slave {}",
                    cnt, addr, slave
                );
                self.bus
                    .handle_read_holding_registers(slave, addr, cnt)
                    .map(Response::ReadHoldingRegisters)
                    .map_err(ExceptionCode::from)
            }
            other => {
                error!(
                    "Exception::IllegalFunction - Unimplemented function code in request: {other:?}"
                );
                Err(ExceptionCode::IllegalFunction)
            }
        }
    }
}

impl tokio_modbus::server::Service for FieldBusService {
    type Request = SlaveRequest<'static>;
    type Response = Response;
    type Exception = ExceptionCode;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    fn call(&self, req: Self::Request) -> Self::Future {
        debug!("Received Modbus request: {:?}", req);
        let res = self.handle(req);

        if let Err(e) = &res {
            debug!("Modbus request answered with exception: {:?}", e);
        }

        future::ready(res)
    }
}

/// Serve the field bus over Modbus TCP on an already bound listener.
///
/// Returns once `running` is cleared. The accept loop is then aborted and
/// every client socket is closed, so connections opened before the stop get
/// no further answers. Each step is awaited for at most five seconds.
pub async fn serve_tcp_listener(
    bus: Arc<FieldBus>,
    listener: TcpListener,
    running: Arc<AtomicBool>,
) -> Result<()> {
    let local_addr = listener.local_addr()?;
    info!("Modbus TCP server listening on {}", local_addr);

    let server = Server::new(listener);
    let connections = Arc::new(Mutex::new(JoinSet::new()));

    let accepted = Arc::clone(&connections);
    let on_connected = move |stream: TcpStream, socket_addr: SocketAddr| {
        let bus = Arc::clone(&bus);
        let accepted = Arc::clone(&accepted);
        async move { accept_connection(bus, &accepted, stream, socket_addr) }
    };

    let on_process_error = |err| {
        error!("Modbus server error: {err}");
    };

    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.serve(&on_connected, on_process_error).await {
            error!("Modbus server error: {}", e);
        }
    });

    wait_for_stop(&running).await;

    info!("Shutting down Modbus TCP server on {}...", local_addr);
    server_handle.abort();
    match time::timeout(SHUTDOWN_TIMEOUT, server_handle).await {
        Ok(_) => info!("Modbus TCP server shut down successfully"),
        Err(_) => warn!("Modbus TCP server shutdown timed out, forcing termination"),
    }

    let mut open = {
        let mut connections = connections.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *connections)
    };
    debug!("Closing {} Modbus client connection(s)", open.len());
    open.abort_all();
    let drained = time::timeout(SHUTDOWN_TIMEOUT, async {
        while open.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!("Modbus client connections did not close in time");
    }

    Ok(())
}

/// Hand a new client to `tokio-modbus` through an in-memory pipe.
///
/// The client socket stays owned by a task in `connections`. Aborting that
/// task closes the socket and ends the Modbus session reading the pipe.
fn accept_connection(
    bus: Arc<FieldBus>,
    connections: &Mutex<JoinSet<()>>,
    stream: TcpStream,
    socket_addr: SocketAddr,
) -> io::Result<Option<(FieldBusService, DuplexStream)>> {
    debug!("Modbus client connected from {}", socket_addr);
    let Some((service, mut stream)) = accept_tcp_connection(stream, socket_addr, |_| {
        Ok(Some(FieldBusService::new(Arc::clone(&bus))))
    })?
    else {
        return Ok(None);
    };

    let (transport, mut bridge) = tokio::io::duplex(BRIDGE_BUFFER_SIZE);
    let mut connections = connections.lock().unwrap_or_else(PoisonError::into_inner);
    // Reap sessions that already ended
    while connections.try_join_next().is_some() {}
    connections.spawn(async move {
        match tokio::io::copy_bidirectional(&mut stream, &mut bridge).await {
            Ok((received, sent)) => debug!(
                "Modbus client {} disconnected ({} bytes received, {} bytes sent)",
                socket_addr, received, sent
            ),
            Err(e) => debug!("Modbus client {} connection closed: {}", socket_addr, e),
        }
    });

    Ok(Some((service, transport)))
}

/// Bind `socket_addr` and serve the field bus over Modbus TCP.
pub async fn serve_tcp(
    bus: Arc<FieldBus>,
    socket_addr: SocketAddr,
    running: Arc<AtomicBool>,
) -> Result<()> {
    let listener = TcpListener::bind(socket_addr)
        .await
        .with_context(|| format!("Failed to bind Modbus TCP server to {}", socket_addr))?;
    serve_tcp_listener(bus, listener, running).await
}

/// Serve the field bus as Modbus RTU slaves on a serial port.
///
/// Every bus address registered on `bus` answers on the same serial line.
pub async fn serve_rtu(
    bus: Arc<FieldBus>,
    serial_port: &str,
    baud_rate: u32,
    running: Arc<AtomicBool>,
) -> Result<()> {
    let builder = tokio_serial::new(serial_port, baud_rate)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .data_bits(tokio_serial::DataBits::Eight)
        .flow_control(tokio_serial::FlowControl::None);
    let serial = tokio_serial::SerialStream::open(&builder)
        .with_context(|| format!("Failed to open serial port {}", serial_port))?;
    info!(
        "Modbus RTU server listening on {} at {} baud",
        serial_port, baud_rate
    );

    let server = tokio_modbus::server::rtu::Server::new(serial);
    let service = FieldBusService::new(bus);
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.serve_forever(service).await {
            error!("Modbus RTU server error: {}", e);
        }
    });

    wait_for_stop(&running).await;

    info!("Shutting down Modbus RTU server...");
    server_handle.abort();
    match time::timeout(SHUTDOWN_TIMEOUT, server_handle).await {
        Ok(_) => info!("Modbus RTU server shut down successfully"),
        Err(_) => warn!("Modbus RTU server shutdown timed out, forcing termination"),
    }

    Ok(())
}

async fn wait_for_stop(running: &AtomicBool) {
    while running.load(Ordering::SeqCst) {
        time::sleep(RUNNING_POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::{cerus_x_drive::registers, CerusXDrive};

    fn connected_bus() -> Arc<FieldBus> {
        let bus = Arc::new(FieldBus::new());
        bus.add(Arc::new(CerusXDrive::new(10))).unwrap();
        bus.connect();
        bus
    }

    #[test]
    fn routes_by_slave_id() {
        let service = FieldBusService::new(connected_bus());
        let res = service.handle(SlaveRequest {
            slave: 10,
            request: Request::ReadHoldingRegisters(registers::OUTPUT_CURRENT, 1),
        });
        assert_eq!(res, Ok(Response::ReadHoldingRegisters(vec![422])));

        let res = service.handle(SlaveRequest {
            slave: 11,
            request: Request::ReadHoldingRegisters(registers::OUTPUT_CURRENT, 1),
        });
        assert_eq!(res, Err(ExceptionCode::IllegalDataAddress));
    }

    #[test]
    fn other_function_codes_are_illegal() {
        let service = FieldBusService::new(connected_bus());
        let res = service.handle(SlaveRequest {
            slave: 10,
            request: Request::ReadInputRegisters(registers::OUTPUT_CURRENT, 1),
        });
        assert_eq!(res, Err(ExceptionCode::IllegalFunction));
    }

    #[test]
    fn disconnected_bus_refuses_requests() {
        let bus = connected_bus();
        bus.disconnect();
        let service = FieldBusService::new(bus);
        let res = service.handle(SlaveRequest {
            slave: 10,
            request: Request::ReadHoldingRegisters(registers::OUTPUT_CURRENT, 1),
        });
        assert_eq!(res, Err(ExceptionCode::ServerDeviceFailure));
    }
}
