//! Tick-driven disassembly trace. Not attached by `Config::default()`; a
//! purely additive device for tests and debugging. Grounded on
//! `christiankuhl-em68k/src/devices.rs`'s `ASMStream` (prints a disassembly
//! line every tick; `read`/`write` are no-ops) and this crate's own
//! [`crate::disasm`] for the mnemonic rendering.

use std::cell::Cell;
use std::io::{self, Write};

use crate::disasm;
use crate::emulator::devices::memory::MemoryHandle;
use crate::emulator::devices::{Device, IoType};
use crate::error::Error;

const MAX_INSTRUCTION_BYTES: usize = 4;

pub struct DisassemblyDevice<W: Write = io::Stdout> {
    name: String,
    min_address: u16,
    max_address: u16,
    memory: MemoryHandle,
    cursor: Cell<u16>,
    out: W,
}

impl DisassemblyDevice<io::Stdout> {
    pub fn new(min_address: u16, max_address: u16, memory: MemoryHandle, start: u16) -> Self {
        Self::with_writer(min_address, max_address, memory, start, io::stdout())
    }
}

impl<W: Write> DisassemblyDevice<W> {
    pub fn with_writer(min_address: u16, max_address: u16, memory: MemoryHandle, start: u16, out: W) -> Self {
        Self { name: "disasm".to_string(), min_address, max_address, memory, cursor: Cell::new(start), out }
    }

    fn window(&self) -> [u8; MAX_INSTRUCTION_BYTES] {
        let base = self.cursor.get();
        let mut buf = [0u8; MAX_INSTRUCTION_BYTES];
        for (i, b) in buf.iter_mut().enumerate() {
            *b = self.memory.read_byte(base.wrapping_add(i as u16));
        }
        buf
    }
}

impl<W: Write> Device for DisassemblyDevice<W> {
    fn name(&self) -> &str {
        &self.name
    }

    fn range(&self) -> (u16, u16) {
        (self.min_address, self.max_address)
    }

    fn io_type(&self) -> IoType {
        IoType::ReadWrite
    }

    fn read_byte(&mut self, _addr: u16) -> Result<u8, Error> {
        Ok(0)
    }

    fn write_byte(&mut self, _addr: u16, _value: u8) -> Result<(), Error> {
        Ok(())
    }

    fn tick(&mut self) {
        let window = self.window();
        if let Some((len, text)) = disasm::disassemble_one(&window, 0) {
            let _ = writeln!(self.out, "{:04x}: {text}", self.cursor.get());
            self.cursor.set(self.cursor.get().wrapping_add(len as u16));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::assemble_str;
    use crate::charset::CharSet;
    use crate::emulator::devices::memory::MemoryDevice;

    #[test]
    fn tick_prints_one_instruction_and_advances_cursor() {
        let bytes = assemble_str("t.asm", "NOP\nHALT\n", CharSet::Cp437).unwrap();
        let mut mem = MemoryDevice::new("ram", 0x0000, 0x00FF, false);
        mem.load_program(&bytes, 0).unwrap();
        let mut trace = DisassemblyDevice::with_writer(0xFF00, 0xFF00, mem.handle(), 0, Vec::new());
        trace.tick();
        trace.tick();
        let output = String::from_utf8(trace.out.clone()).unwrap();
        assert!(output.contains("NOP"));
        assert!(output.contains("HALT"));
    }

    #[test]
    fn read_and_write_are_no_ops() {
        let mem = MemoryDevice::new("ram", 0x0000, 0x00FF, false);
        let mut trace = DisassemblyDevice::with_writer(0xFF00, 0xFF00, mem.handle(), 0, Vec::new());
        assert_eq!(trace.read_byte(0xFF00).unwrap(), 0);
        assert!(trace.write_byte(0xFF00, 1).is_ok());
    }
}
