// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the field-device-emulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Current loop transmitter emulation
//!
//! This module emulates 4-20mA / 0-20mA analog transmitters:
//!
//! - [`range`]: loop spans and the stateless range-mapping engine
//! - [`transmitter`]: the output stage holding the last commanded current
//! - [`sensor`]: temperature, pressure and current transmitters built from both
//!
//! ## Usage
//!
//! ```
//! use field_device_emulator::current_loop::{
//!     CurrentLoopRange, SimulatedTransmitter, TemperatureTransmitter,
//! };
//!
//! let mut sensor = TemperatureTransmitter::new(
//!     SimulatedTransmitter::new(),
//!     CurrentLoopRange::FourToTwenty,
//!     0.0,
//!     100.0,
//! )
//! .unwrap();
//!
//! sensor.set_temperature(50.0).unwrap();
//! assert!((sensor.output_current() - 12.0).abs() < 1e-6);
//! ```

pub mod range;
pub mod sensor;
pub mod transmitter;

pub use range::{
    loop_to_sensed, map_to_loop, validate_span, CurrentLoopRange, ParseLoopRangeError, RangeError,
};
pub use sensor::{
    CurrentTransmitter, PressureTransmitter, RangeMappedSensor, SensorError, SensorKind,
    TemperatureTransmitter,
};
pub use transmitter::{
    check_output_envelope, CurrentLoopTransmitter, SimulatedTransmitter, TransmitterError,
};
