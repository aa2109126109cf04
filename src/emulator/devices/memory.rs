//! Linear RAM device, spec.md §4.5. Grounded on
//! `christiankuhl-em68k/src/memory.rs`'s `RAM` and `MemoryHandle`, and
//! `original_source/src/emulator/devices/memory.py` (note: the Python
//! original indexes `self.data[addr]` directly without subtracting
//! `min_address`, which only works because its RAM happens to start at 0;
//! this device offsets by `min_address` so any window works).

use std::cell::RefCell;
use std::rc::Rc;

use crate::emulator::devices::{Device, IoType};
use crate::error::Error;

/// A cloneable read-only window into a [`MemoryDevice`]'s backing array,
/// for devices (the console framebuffer reader) that need to observe
/// memory outside their own address range without owning the bus.
/// Mirrors the teacher's own `MemoryHandle` in `src/memory.rs`.
#[derive(Clone)]
pub struct MemoryHandle {
    data: Rc<RefCell<Vec<u8>>>,
    min_address: u16,
}

impl MemoryHandle {
    pub fn read_byte(&self, addr: u16) -> u8 {
        let idx = addr.wrapping_sub(self.min_address) as usize;
        self.data.borrow().get(idx).copied().unwrap_or(0)
    }
}

pub struct MemoryDevice {
    name: String,
    min_address: u16,
    max_address: u16,
    read_only: bool,
    data: Rc<RefCell<Vec<u8>>>,
}

impl MemoryDevice {
    pub fn new(name: impl Into<String>, min_address: u16, max_address: u16, read_only: bool) -> Self {
        let size = max_address as usize - min_address as usize + 1;
        Self {
            name: name.into(),
            min_address,
            max_address,
            read_only,
            data: Rc::new(RefCell::new(vec![0; size])),
        }
    }

    pub fn handle(&self) -> MemoryHandle {
        MemoryHandle { data: Rc::clone(&self.data), min_address: self.min_address }
    }

    /// Copy `bytes` into the device starting at `base`. Used by the
    /// loader to install an assembled image before the CPU starts running.
    pub fn load_program(&mut self, bytes: &[u8], base: u16) -> Result<(), Error> {
        for (i, b) in bytes.iter().enumerate() {
            let addr = base.wrapping_add(i as u16);
            self.write_raw(addr, *b)?;
        }
        Ok(())
    }

    fn offset(&self, addr: u16) -> Result<usize, Error> {
        if addr < self.min_address || addr > self.max_address {
            return Err(Error::BusFault { address: addr, message: format!("{} does not map {:#06x}", self.name, addr) });
        }
        Ok((addr - self.min_address) as usize)
    }

    fn write_raw(&mut self, addr: u16, value: u8) -> Result<(), Error> {
        let idx = self.offset(addr)?;
        self.data.borrow_mut()[idx] = value;
        Ok(())
    }

    pub fn dump(&self) -> Vec<u8> {
        self.data.borrow().clone()
    }
}

impl Device for MemoryDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn range(&self) -> (u16, u16) {
        (self.min_address, self.max_address)
    }

    fn io_type(&self) -> IoType {
        if self.read_only {
            IoType::ReadOnly
        } else {
            IoType::ReadWrite
        }
    }

    fn read_byte(&mut self, addr: u16) -> Result<u8, Error> {
        let idx = self.offset(addr)?;
        Ok(self.data.borrow()[idx])
    }

    fn write_byte(&mut self, addr: u16, value: u8) -> Result<(), Error> {
        if self.read_only {
            return Err(Error::BusFault {
                address: addr,
                message: format!("{} is read-only", self.name),
            });
        }
        self.write_raw(addr, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_and_reads_program() {
        let mut mem = MemoryDevice::new("ram", 0x0000, 0xEFFF, false);
        mem.load_program(&[0x04, 0x00], 0).unwrap();
        assert_eq!(mem.read_byte(0x0000).unwrap(), 0x04);
        assert_eq!(mem.read_byte(0x0001).unwrap(), 0x00);
    }

    #[test]
    fn out_of_range_is_bus_fault() {
        let mut mem = MemoryDevice::new("ram", 0x1000, 0x1FFF, false);
        assert!(mem.read_byte(0x0000).is_err());
    }

    #[test]
    fn read_only_rejects_writes() {
        let mut mem = MemoryDevice::new("rom", 0x0000, 0x00FF, true);
        assert!(mem.write_byte(0x0000, 1).is_err());
    }

    #[test]
    fn windowed_device_offsets_correctly() {
        let mut mem = MemoryDevice::new("hi", 0x1000, 0x10FF, false);
        mem.write_byte(0x1000, 0xAB).unwrap();
        assert_eq!(mem.read_byte(0x1000).unwrap(), 0xAB);
    }

    #[test]
    fn handle_reads_independently_of_device_borrow() {
        let mut mem = MemoryDevice::new("ram", 0x0000, 0x00FF, false);
        let handle = mem.handle();
        mem.write_byte(0x0010, 0x42).unwrap();
        assert_eq!(handle.read_byte(0x0010), 0x42);
    }
}
