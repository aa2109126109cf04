//! Device capability set, spec.md §4.5. Grounded on
//! `christiankuhl-em68k/src/devices.rs`'s `Device` trait (the teacher's own
//! `read`/`write`/`update` shape, generalized to byte-addressed `io_type`
//! rules) and `original_source/src/emulator/devices/device.py`.

pub mod console;
pub mod disassembly;
pub mod keyboard;
pub mod memory;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoType {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl IoType {
    pub fn readable(self) -> bool {
        matches!(self, IoType::ReadOnly | IoType::ReadWrite)
    }

    pub fn writable(self) -> bool {
        matches!(self, IoType::WriteOnly | IoType::ReadWrite)
    }
}

/// A memory-mapped device. Implementors own a fixed, inclusive address
/// range; the [`crate::emulator::bus::Bus`] is the only thing that calls
/// these methods directly.
pub trait Device {
    fn name(&self) -> &str;
    fn range(&self) -> (u16, u16);
    fn io_type(&self) -> IoType;
    fn read_byte(&mut self, addr: u16) -> Result<u8, Error>;
    fn write_byte(&mut self, addr: u16, value: u8) -> Result<(), Error>;
    /// Called by the CPU every `device_tick_rate` instructions.
    fn tick(&mut self) {}

    fn contains(&self, addr: u16) -> bool {
        let (min, max) = self.range();
        addr >= min && addr <= max
    }
}
