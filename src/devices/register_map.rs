// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the field-device-emulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Static holding register tables
//!
//! A device type describes its register map as a static slice of entries,
//! each pairing a register address with an attribute selector and a scale
//! factor. Reading a register is a table lookup followed by
//! [`encode_scaled`]; adding a register means adding an entry.

use log::debug;

/// One holding register exposed by a device type.
pub struct RegisterEntry<S: 'static> {
    /// Register address on the wire
    pub address: u16,
    /// Human readable attribute name
    pub name: &'static str,
    /// Selects the live attribute from the device state
    pub read: fn(&S) -> f64,
    /// Multiplier applied before truncation (1, 10 or 100)
    pub scale: f64,
}

/// Register table of one device type.
pub struct RegisterMap<S: 'static> {
    entries: &'static [RegisterEntry<S>],
}

impl<S: 'static> RegisterMap<S> {
    pub const fn new(entries: &'static [RegisterEntry<S>]) -> Self {
        Self { entries }
    }

    /// Find the entry for a register address.
    pub fn lookup(&self, address: u16) -> Option<&'static RegisterEntry<S>> {
        self.entries.iter().find(|entry| entry.address == address)
    }

    /// Read and encode one register from a state snapshot.
    ///
    /// Returns `None` for addresses that are not mapped.
    pub fn read(&self, state: &S, address: u16) -> Option<u16> {
        self.lookup(address)
            .map(|entry| encode_scaled((entry.read)(state), entry.scale))
    }

    /// All mapped register addresses, in table order.
    pub fn addresses(&self) -> impl Iterator<Item = u16> + '_ {
        self.entries.iter().map(|entry| entry.address)
    }

    pub fn entries(&self) -> &'static [RegisterEntry<S>] {
        self.entries
    }
}

/// Encode a live value as a scaled, truncated 16-bit register.
///
/// The scaled value is truncated toward zero and saturates at the register
/// bounds: negative values read as 0, values above 65535 read as 65535 and
/// NaN reads as 0.
pub fn encode_scaled(value: f64, scale: f64) -> u16 {
    let scaled = value * scale;
    if !(0.0..=f64::from(u16::MAX)).contains(&scaled) {
        debug!(
            "Register value {} saturated to 16 bits (raw {} x {})",
            scaled, value, scale
        );
    }
    // `as` truncates toward zero and saturates, NaN maps to 0
    scaled as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe {
        level: f64,
        flags: u16,
    }

    const PROBE_ENTRIES: &[RegisterEntry<Probe>] = &[
        RegisterEntry {
            address: 100,
            name: "level",
            read: |p: &Probe| p.level,
            scale: 10.0,
        },
        RegisterEntry {
            address: 101,
            name: "flags",
            read: |p: &Probe| f64::from(p.flags),
            scale: 1.0,
        },
    ];

    const PROBE_REGISTERS: RegisterMap<Probe> = RegisterMap::new(PROBE_ENTRIES);

    #[test]
    fn mapped_registers_are_scaled_and_truncated() {
        let probe = Probe {
            level: 12.37,
            flags: 0x00A5,
        };
        assert_eq!(PROBE_REGISTERS.read(&probe, 100), Some(123));
        assert_eq!(PROBE_REGISTERS.read(&probe, 101), Some(0x00A5));
        assert_eq!(PROBE_REGISTERS.read(&probe, 102), None);
        assert_eq!(PROBE_REGISTERS.addresses().collect::<Vec<_>>(), vec![100, 101]);
        assert_eq!(PROBE_REGISTERS.lookup(101).map(|e| e.name), Some("flags"));
    }

    #[test]
    fn encoding_saturates() {
        assert_eq!(encode_scaled(42.2, 10.0), 422);
        assert_eq!(encode_scaled(-3.0, 10.0), 0);
        assert_eq!(encode_scaled(70_000.0, 1.0), u16::MAX);
        assert_eq!(encode_scaled(f64::NAN, 10.0), 0);
        assert_eq!(encode_scaled(6553.59, 10.0), 65535);
    }
}
