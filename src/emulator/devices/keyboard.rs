//! Byte-FIFO keyboard device, spec.md §4.5. Grounded on
//! `original_source/src/emulator/devices/keyboard.py` (`queue.Queue` +
//! `threading.Lock` for the input thread, here a `Mutex<VecDeque<u8>>`).

use std::collections::VecDeque;
use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::emulator::devices::{Device, IoType};
use crate::error::Error;

const DATA_READY: u8 = 0b0000_0001;

#[derive(Clone)]
pub struct KeyboardFifo(Arc<Mutex<VecDeque<u8>>>);

impl KeyboardFifo {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(VecDeque::new())))
    }

    /// Push a host keystroke byte. Called by `tick` on hosts with
    /// non-blocking polling, or by the feeder thread spawned by
    /// [`KeyboardDevice::spawn_stdin_feeder`] otherwise.
    pub fn push(&self, byte: u8) {
        self.0.lock().unwrap().push_back(byte);
    }
}

pub struct KeyboardDevice {
    name: String,
    min_address: u16,
    max_address: u16,
    fifo: KeyboardFifo,
}

impl KeyboardDevice {
    pub fn new(min_address: u16, max_address: u16) -> Self {
        Self { name: "keyboard".to_string(), min_address, max_address, fifo: KeyboardFifo::new() }
    }

    pub fn fifo(&self) -> KeyboardFifo {
        self.fifo.clone()
    }

    /// Spawn a background thread that reads bytes from stdin and pushes
    /// them into this device's FIFO, for hosts without reliable
    /// non-blocking key polling (spec.md §5's "dedicated producer
    /// thread"). The thread owns no CPU or bus state, only the FIFO.
    pub fn spawn_stdin_feeder(&self) -> JoinHandle<()> {
        let fifo = self.fifo.clone();
        thread::spawn(move || {
            let mut byte = [0u8; 1];
            let mut stdin = std::io::stdin();
            while let Ok(n) = stdin.read(&mut byte) {
                if n == 0 {
                    break;
                }
                fifo.push(byte[0]);
            }
        })
    }

    fn data_addr(&self) -> u16 {
        self.min_address
    }

    fn status_addr(&self) -> u16 {
        self.max_address
    }
}

impl Device for KeyboardDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn range(&self) -> (u16, u16) {
        (self.min_address, self.max_address)
    }

    fn io_type(&self) -> IoType {
        IoType::ReadOnly
    }

    fn read_byte(&mut self, addr: u16) -> Result<u8, Error> {
        if addr == self.data_addr() {
            let mut fifo = self.fifo.0.lock().unwrap();
            Ok(fifo.pop_front().unwrap_or(0))
        } else if addr == self.status_addr() {
            let fifo = self.fifo.0.lock().unwrap();
            Ok(if fifo.is_empty() { 0 } else { DATA_READY })
        } else {
            Err(Error::BusFault { address: addr, message: "keyboard does not map this address".to_string() })
        }
    }

    fn write_byte(&mut self, addr: u16, _value: u8) -> Result<(), Error> {
        Err(Error::BusFault { address: addr, message: "keyboard is read-only".to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_reflects_fifo_occupancy() {
        let mut kbd = KeyboardDevice::new(0xF002, 0xF003);
        assert_eq!(kbd.read_byte(0xF003).unwrap(), 0);
        kbd.fifo().push(b'x');
        assert_eq!(kbd.read_byte(0xF003).unwrap(), DATA_READY);
    }

    #[test]
    fn data_dequeues_and_clears_ready() {
        let mut kbd = KeyboardDevice::new(0xF002, 0xF003);
        kbd.fifo().push(b'x');
        assert_eq!(kbd.read_byte(0xF002).unwrap(), b'x');
        assert_eq!(kbd.read_byte(0xF003).unwrap(), 0);
    }

    #[test]
    fn writes_are_rejected() {
        let mut kbd = KeyboardDevice::new(0xF002, 0xF003);
        assert!(kbd.write_byte(0xF002, 1).is_err());
    }
}
