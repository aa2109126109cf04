//! Wires the CPU, bus, and default devices together, spec.md §6.4.
//! Grounded on `christiankuhl-em68k/src/lib.rs`'s `Configuration`/`Emulator`.

pub mod bus;
pub mod cpu;
pub mod devices;

use bus::Bus;
use cpu::Cpu;
use devices::console::ConsoleDevice;
use devices::keyboard::KeyboardDevice;
use devices::memory::MemoryDevice;

use crate::error::{Error, StopReason};

/// Default memory map, spec.md §6: RAM fills everything below the
/// console/keyboard windows at the top of the address space.
pub const RAM_RANGE: (u16, u16) = (0x0000, 0xEFFF);
pub const CONSOLE_RANGE: (u16, u16) = (0xF000, 0xF001);
pub const KEYBOARD_RANGE: (u16, u16) = (0xF002, 0xF003);

const DEFAULT_DEVICE_TICK_RATE: u64 = 1000;
const DEFAULT_CONSOLE_WIDTH: usize = 80;
const DEFAULT_CONSOLE_HEIGHT: usize = 25;
const DEFAULT_CONSOLE_REFRESH_HZ: f64 = 30.0;

/// Bundles the memory map and run parameters, so embedders can override
/// them without touching CPU code. Mirrors the role `Configuration` plays
/// for the teacher's Atari memory layout.
pub struct Config {
    pub ram_range: (u16, u16),
    pub console_range: (u16, u16),
    pub keyboard_range: (u16, u16),
    pub console_width: usize,
    pub console_height: usize,
    pub console_refresh_hz: f64,
    pub device_tick_rate: u64,
    pub max_cycles: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ram_range: RAM_RANGE,
            console_range: CONSOLE_RANGE,
            keyboard_range: KEYBOARD_RANGE,
            console_width: DEFAULT_CONSOLE_WIDTH,
            console_height: DEFAULT_CONSOLE_HEIGHT,
            console_refresh_hz: DEFAULT_CONSOLE_REFRESH_HZ,
            device_tick_rate: DEFAULT_DEVICE_TICK_RATE,
            max_cycles: None,
        }
    }
}

pub struct Emulator {
    pub cpu: Cpu,
    pub bus: Bus,
    max_cycles: Option<u64>,
}

impl Emulator {
    pub fn new(config: Config) -> Self {
        let mut ram = MemoryDevice::new("ram", config.ram_range.0, config.ram_range.1, false);
        let ram_handle = ram.handle();
        let console = ConsoleDevice::new(
            config.console_range.0,
            config.console_range.1,
            ram_handle,
            config.console_width,
            config.console_height,
            config.console_refresh_hz,
        );
        let keyboard = KeyboardDevice::new(config.keyboard_range.0, config.keyboard_range.1);

        let mut bus = Bus::new();
        bus.attach(Box::new(ram));
        bus.attach(Box::new(console));
        bus.attach(Box::new(keyboard));

        Self { cpu: Cpu::new(config.device_tick_rate), bus, max_cycles: config.max_cycles }
    }

    /// Load an assembled image into RAM at `base` before running.
    pub fn load(&mut self, bytes: &[u8], base: u16) -> Result<(), Error> {
        for (i, b) in bytes.iter().enumerate() {
            self.bus.write_byte(base.wrapping_add(i as u16), *b)?;
        }
        Ok(())
    }

    /// Run to completion (or `steps` instructions, or `max_cycles`).
    pub fn run(&mut self, steps: i64) -> Result<StopReason, Error> {
        self.cpu.run(&mut self.bus, steps, self.max_cycles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charset::CharSet;

    #[test]
    fn runs_assembled_program_to_halt() {
        let bytes = crate::assembler::assemble_str("t.asm", "MOV r0, 0x10\nADD r0, r0\nHALT\n", CharSet::Cp437).unwrap();
        let mut emulator = Emulator::new(Config::default());
        emulator.load(&bytes, 0).unwrap();
        let reason = emulator.run(-1).unwrap();
        assert_eq!(reason, StopReason::Halt);
        assert_eq!(emulator.cpu.regs[0], 0x20);
    }

    #[test]
    fn max_cycles_stops_before_halt() {
        let bytes = crate::assembler::assemble_str("t.asm", "loop:\nJMP loop\n", CharSet::Cp437).unwrap();
        let mut config = Config::default();
        config.max_cycles = Some(5);
        let mut emulator = Emulator::new(config);
        emulator.load(&bytes, 0).unwrap();
        let reason = emulator.run(-1).unwrap();
        assert_eq!(reason, StopReason::CycleLimit);
    }
}
