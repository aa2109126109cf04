//! Address-range device dispatch, spec.md §4.4. Grounded on
//! `christiankuhl-em68k/src/memory.rs`'s `Bus` (`devices: DeviceList`,
//! `attach`/`read`/`write`/`update`) and `original_source/src/bus.py`.

use crate::emulator::devices::Device;
use crate::error::Error;

pub struct Bus {
    devices: Vec<Box<dyn Device>>,
}

impl Bus {
    pub fn new() -> Self {
        Self { devices: Vec::new() }
    }

    pub fn attach(&mut self, device: Box<dyn Device>) {
        self.devices.push(device);
    }

    fn device_for(&mut self, addr: u16) -> Result<&mut Box<dyn Device>, Error> {
        self.devices
            .iter_mut()
            .find(|d| d.contains(addr))
            .ok_or_else(|| Error::BusFault { address: addr, message: "no device mapped".to_string() })
    }

    pub fn read_byte(&mut self, addr: u16) -> Result<u8, Error> {
        let device = self.device_for(addr)?;
        if !device.io_type().readable() {
            return Err(Error::BusFault { address: addr, message: format!("{} is not readable", device.name()) });
        }
        device.read_byte(addr)
    }

    pub fn write_byte(&mut self, addr: u16, value: u8) -> Result<(), Error> {
        let device = self.device_for(addr)?;
        if !device.io_type().writable() {
            return Err(Error::BusFault { address: addr, message: format!("{} is not writable", device.name()) });
        }
        device.write_byte(addr, value)
    }

    /// Two independently-routed byte transactions, big-endian. A word may
    /// straddle two devices; this is allowed, per spec.md §4.4.
    pub fn read_word(&mut self, addr: u16) -> Result<u16, Error> {
        let hi = self.read_byte(addr)?;
        let lo = self.read_byte(addr.wrapping_add(1))?;
        Ok(((hi as u16) << 8) | lo as u16)
    }

    pub fn write_word(&mut self, addr: u16, value: u16) -> Result<(), Error> {
        self.write_byte(addr, (value >> 8) as u8)?;
        self.write_byte(addr.wrapping_add(1), (value & 0xFF) as u8)?;
        Ok(())
    }

    pub fn tick_devices(&mut self) {
        for device in self.devices.iter_mut() {
            device.tick();
        }
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emulator::devices::memory::MemoryDevice;

    #[test]
    fn word_access_is_two_byte_transactions() {
        let mut bus = Bus::new();
        bus.attach(Box::new(MemoryDevice::new("ram", 0x0000, 0xFFFF, false)));
        bus.write_word(0x0010, 0xABCD).unwrap();
        assert_eq!(bus.read_byte(0x0010).unwrap(), 0xAB);
        assert_eq!(bus.read_byte(0x0011).unwrap(), 0xCD);
        assert_eq!(bus.read_word(0x0010).unwrap(), 0xABCD);
    }

    #[test]
    fn unmapped_address_is_fatal() {
        let mut bus = Bus::new();
        bus.attach(Box::new(MemoryDevice::new("ram", 0x0000, 0x00FF, false)));
        assert!(bus.read_byte(0x1000).is_err());
    }

    #[test]
    fn read_only_device_rejects_writes_via_bus() {
        let mut bus = Bus::new();
        bus.attach(Box::new(MemoryDevice::new("rom", 0x0000, 0x00FF, true)));
        assert!(bus.write_byte(0x0000, 1).is_err());
    }
}
