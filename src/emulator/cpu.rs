//! Fetch-decode-execute engine, spec.md §4.3. Exact arithmetic and flag
//! semantics are grounded on `original_source/src/cpu.py` (`exec_alu`,
//! `exec_jump`, `exec_mem_stack`, `apply_addressing_mode`,
//! `update_stack_addr`); the decode-loop/register-file shape is grounded
//! on `christiankuhl-em68k/src/processor.rs`'s `CPU`/`clock_cycle`.

use crate::assembler::operand::AddressingMode;
use crate::emulator::bus::Bus;
use crate::error::{Error, StopReason};
use crate::mnemonics;

pub const SP: u8 = 7;
pub const PC: u8 = 8;

const STACK_MASK: u16 = 0xE000;

/// The four architectural condition flags, spec.md §3. `v` is reserved:
/// modelled, but no instruction writes it yet (spec.md's own caveat).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    pub z: bool,
    pub n: bool,
    pub c: bool,
    pub v: bool,
}

pub struct Cpu {
    pub regs: [u16; 9],
    pub flags: Flags,
    pub cycles: u64,
    pub halted: bool,
    device_tick_rate: u64,
}

impl Cpu {
    pub fn new(device_tick_rate: u64) -> Self {
        let mut cpu = Self { regs: [0; 9], flags: Flags::default(), cycles: 0, halted: false, device_tick_rate };
        cpu.reset();
        cpu
    }

    /// Architectural reset, spec.md §4.3: all GPRs zero, SP = 0xEFFF,
    /// PC = 0, flags clear, cycle counter zero, not halted.
    pub fn reset(&mut self) {
        self.regs = [0; 9];
        self.regs[SP as usize] = 0xEFFF;
        self.flags = Flags::default();
        self.cycles = 0;
        self.halted = false;
    }

    pub fn pc(&self) -> u16 {
        self.regs[PC as usize]
    }

    fn set_pc(&mut self, value: u16) {
        self.regs[PC as usize] = value;
    }

    fn advance_pc(&mut self, by: u16) {
        self.regs[PC as usize] = self.regs[PC as usize].wrapping_add(by);
    }

    fn read_reg(&self, idx: u8) -> Result<u16, Error> {
        self.regs.get(idx as usize).copied().ok_or_else(|| Error::DecodeFault {
            pc: self.pc(),
            opcode: idx as u16,
            message: format!("register index {idx} out of range"),
        })
    }

    /// Writes accept only indices 0..7 (spec.md §3); always updates Z/N.
    fn write_reg(&mut self, idx: u8, value: u16) {
        debug_assert!(idx <= 7, "register writes are limited to R0..R7 by the 3-bit dest field");
        self.regs[idx as usize] = value;
        self.flags.z = value == 0;
        self.flags.n = value & 0x8000 != 0;
    }

    fn sp(&self) -> u16 {
        self.regs[SP as usize]
    }

    fn set_sp(&mut self, value: u16) {
        self.regs[SP as usize] = value | STACK_MASK;
    }

    fn push_byte(&mut self, bus: &mut Bus, value: u8) -> Result<(), Error> {
        let new_sp = self.sp().wrapping_sub(1) | STACK_MASK;
        bus.write_byte(new_sp, value)?;
        self.regs[SP as usize] = new_sp;
        Ok(())
    }

    fn push_word(&mut self, bus: &mut Bus, value: u16) -> Result<(), Error> {
        let new_sp = self.sp().wrapping_sub(2) | STACK_MASK;
        bus.write_word(new_sp, value)?;
        self.regs[SP as usize] = new_sp;
        Ok(())
    }

    fn pop_byte(&mut self, bus: &mut Bus) -> Result<u8, Error> {
        let addr = self.sp();
        let value = bus.read_byte(addr)?;
        self.set_sp(addr.wrapping_add(1));
        Ok(value)
    }

    fn pop_word(&mut self, bus: &mut Bus) -> Result<u16, Error> {
        let addr = self.sp();
        let value = bus.read_word(addr)?;
        self.set_sp(addr.wrapping_add(2));
        Ok(value)
    }

    /// Run until halted, `steps` instructions have executed (negative =
    /// unbounded), or `max_cycles` is reached. Ticks every attached device
    /// every `device_tick_rate` instructions.
    pub fn run(&mut self, bus: &mut Bus, steps: i64, max_cycles: Option<u64>) -> Result<StopReason, Error> {
        let mut executed: i64 = 0;
        loop {
            if self.halted {
                return Ok(StopReason::Halt);
            }
            if steps >= 0 && executed >= steps {
                return Ok(StopReason::StepsExhausted);
            }
            if let Some(limit) = max_cycles {
                if self.cycles >= limit {
                    return Ok(StopReason::CycleLimit);
                }
            }
            self.step(bus)?;
            executed += 1;
            if self.cycles % self.device_tick_rate == 0 {
                bus.tick_devices();
            }
        }
    }

    /// Fetch, decode, and execute exactly one instruction.
    pub fn step(&mut self, bus: &mut Bus) -> Result<(), Error> {
        if self.halted {
            return Ok(());
        }
        let pc = self.pc();
        let word = bus.read_word(pc)?;
        self.advance_pc(2);
        self.cycles += 1;

        let opcode = ((word >> 10) & 0x3F) as u8;
        let dest_field = ((word >> 7) & 0x7) as u8;
        let operand_field = ((word >> 3) & 0xF) as u8;
        let mode_bits = (word & 0x7) as u8;
        let mode = decode_mode(mode_bits, self.pc(), word)?;

        let class = opcode >> 4;
        match class {
            0b00 => self.exec_general(bus, opcode, dest_field, operand_field, mode),
            0b01 => self.exec_alu(bus, opcode, dest_field, operand_field, mode),
            0b10 if opcode & 0b1000 == 0 => self.exec_jump(bus, opcode, dest_field, operand_field, mode),
            0b10 => self.exec_mem_stack(bus, opcode, dest_field, operand_field, mode),
            _ => Err(Error::DecodeFault { pc, opcode: opcode as u16, message: "undefined opcode class".to_string() }),
        }
    }

    /// Resolve the 4-bit operand field under `mode`. `fetch_addr` selects
    /// the address form (used by jumps, loads/stores, push sources) over
    /// the value form (ALU/MOV/push-source-by-value); for the non-indirect
    /// modes the two forms coincide, per spec.md §4.3's operand-fetch
    /// table.
    fn apply_addressing_mode(
        &mut self,
        bus: &mut Bus,
        operand_field: u8,
        mode: AddressingMode,
        fetch_addr: bool,
    ) -> Result<u16, Error> {
        match mode {
            AddressingMode::Imm4 => Ok(operand_field as u16),
            AddressingMode::Imm8 => {
                let b = bus.read_byte(self.pc())?;
                self.advance_pc(1);
                Ok(b as u16)
            }
            AddressingMode::Imm16 => {
                let w = bus.read_word(self.pc())?;
                self.advance_pc(2);
                Ok(w)
            }
            AddressingMode::Reg => self.read_reg(operand_field),
            AddressingMode::IndirectReg => {
                let addr = self.read_reg(operand_field)?;
                if fetch_addr {
                    Ok(addr)
                } else {
                    bus.read_word(addr)
                }
            }
            AddressingMode::IndirectOffset => {
                let base = self.read_reg(operand_field)?;
                let offset = bus.read_word(self.pc())?;
                self.advance_pc(2);
                let addr = base.wrapping_add(offset);
                if fetch_addr {
                    Ok(addr)
                } else {
                    bus.read_word(addr)
                }
            }
            AddressingMode::IndirectImm16 => {
                let addr = bus.read_word(self.pc())?;
                self.advance_pc(2);
                if fetch_addr {
                    Ok(addr)
                } else {
                    bus.read_word(addr)
                }
            }
        }
    }

    /// The register index for a `reg`-mode single operand (arity-1
    /// mnemonics): PUSH/PUSHB carry it in the 4-bit operand field, every
    /// other such mnemonic in the 3-bit dest field. See spec.md §9,
    /// "PUSH register-field width".
    fn single_operand_reg_index(opcode: u8, dest_field: u8, operand_field: u8) -> u8 {
        if is_push_opcode(opcode) {
            operand_field
        } else {
            dest_field
        }
    }

    fn exec_general(
        &mut self,
        bus: &mut Bus,
        opcode: u8,
        dest_field: u8,
        operand_field: u8,
        mode: AddressingMode,
    ) -> Result<(), Error> {
        match opcode {
            op if op == mnemonics::opcode_for_mnemonic("NOP").unwrap() => Ok(()),
            op if op == mnemonics::opcode_for_mnemonic("HALT").unwrap() => {
                self.halted = true;
                Ok(())
            }
            op if op == mnemonics::opcode_for_mnemonic("RET").unwrap() => {
                let target = self.pop_word(bus)?;
                self.set_pc(target);
                Ok(())
            }
            op if op == mnemonics::opcode_for_mnemonic("MOV").unwrap() => {
                let value = self.apply_addressing_mode(bus, operand_field, mode, false)?;
                self.write_reg(dest_field, value);
                Ok(())
            }
            _ => Err(Error::DecodeFault { pc: self.pc(), opcode: opcode as u16, message: "undefined general opcode".to_string() }),
        }
    }

    fn exec_alu(
        &mut self,
        bus: &mut Bus,
        opcode: u8,
        dest_field: u8,
        operand_field: u8,
        mode: AddressingMode,
    ) -> Result<(), Error> {
        let b = self.apply_addressing_mode(bus, operand_field, mode, false)?;
        let a = self.read_reg(dest_field)?;
        let op = opcode & 0xF;

        let (result, new_c): (u16, Option<bool>) = match op {
            0 => {
                // ADD
                let wide = a as u32 + b as u32;
                (wide as u16, Some(wide > 0xFFFF))
            }
            1 => (a.wrapping_sub(b), Some(a < b)), // SUB
            2 => {
                // MUL
                let wide = a as u32 * b as u32;
                (wide as u16, Some(wide > 0xFFFF))
            }
            3 => {
                // MULH
                let wide = a as u32 * b as u32;
                ((wide >> 16) as u16, None)
            }
            4 => (a & b, None),  // AND
            5 => (a | b, None),  // OR
            6 => (a ^ b, None),  // XOR
            7 => {
                // SHL
                let count = (b & 0xF) as u32;
                if count == 0 {
                    (a, Some(false))
                } else {
                    let last_out = (a >> (16 - count)) & 1 != 0;
                    (a << count, Some(last_out))
                }
            }
            8 => {
                // ROL
                let count = (b & 0xF) as u32;
                if count == 0 {
                    (a, Some(a & 1 != 0))
                } else {
                    let rotated = a.rotate_left(count);
                    (rotated, Some(rotated & 1 != 0))
                }
            }
            9 => {
                // SHR
                let count = (b & 0xF) as u32;
                if count == 0 {
                    (a, None)
                } else {
                    let last_out = (a >> (count - 1)) & 1 != 0;
                    (a >> count, Some(last_out))
                }
            }
            10 => {
                // ASR
                let count = (b & 0xF) as u32;
                if count == 0 {
                    (a, None)
                } else {
                    let last_out = (a >> (count - 1)) & 1 != 0;
                    let result = ((a as i16) >> count) as u16;
                    (result, Some(last_out))
                }
            }
            11 => {
                // ROR
                let count = (b & 0xF) as u32;
                if count == 0 {
                    (a, Some(a & 0x8000 != 0))
                } else {
                    let rotated = a.rotate_right(count);
                    (rotated, Some(rotated & 0x8000 != 0))
                }
            }
            12 => (a.wrapping_sub(b), Some(a < b)), // CMP
            13 => (!a, None),                       // NOT
            14 => (0u16.wrapping_sub(a), None),      // NEG
            _ => {
                return Err(Error::DecodeFault {
                    pc: self.pc(),
                    opcode: opcode as u16,
                    message: "undefined ALU opcode".to_string(),
                })
            }
        };

        self.flags.z = result == 0;
        self.flags.n = result & 0x8000 != 0;
        if let Some(c) = new_c {
            self.flags.c = c;
        }
        if op != 12 {
            // CMP writes only flags.
            self.regs[dest_field as usize] = result;
        }
        Ok(())
    }

    fn exec_jump(
        &mut self,
        bus: &mut Bus,
        opcode: u8,
        dest_field: u8,
        operand_field: u8,
        mode: AddressingMode,
    ) -> Result<(), Error> {
        let reg_index = Self::single_operand_reg_index(opcode, dest_field, operand_field);
        let target = if mode == AddressingMode::Reg {
            self.read_reg(reg_index)?
        } else {
            self.apply_addressing_mode(bus, operand_field, mode, true)?
        };
        let op = opcode & 0x7;
        let condition = match op {
            0 => true,              // JMP
            1 => self.flags.z,      // JZ/JEQ
            2 => !self.flags.z,     // JNZ/JNE
            3 => self.flags.n,      // JLT
            4 => !self.flags.n,     // JGT
            5 => self.flags.c,      // JC
            6 => !self.flags.c,     // JNC
            7 => {
                // CALL: unconditional, pushes the return address first.
                let return_addr = self.pc();
                self.push_word(bus, return_addr)?;
                self.set_pc(target);
                return Ok(());
            }
            _ => unreachable!("3-bit field"),
        };
        if condition {
            self.set_pc(target);
        }
        Ok(())
    }

    fn exec_mem_stack(
        &mut self,
        bus: &mut Bus,
        opcode: u8,
        dest_field: u8,
        operand_field: u8,
        mode: AddressingMode,
    ) -> Result<(), Error> {
        let op = opcode & 0x7;
        match op {
            0 => {
                // LOADB
                let addr = self.apply_addressing_mode(bus, operand_field, mode, true)?;
                let byte = bus.read_byte(addr)?;
                self.write_reg(dest_field, byte as u16);
                Ok(())
            }
            1 => {
                // LOAD
                let addr = self.apply_addressing_mode(bus, operand_field, mode, true)?;
                let word = bus.read_word(addr)?;
                self.write_reg(dest_field, word);
                Ok(())
            }
            2 => {
                // STOREB
                let addr = self.apply_addressing_mode(bus, operand_field, mode, true)?;
                let value = (self.read_reg(dest_field)? & 0xFF) as u8;
                bus.write_byte(addr, value)
            }
            3 => {
                // STORE
                let addr = self.apply_addressing_mode(bus, operand_field, mode, true)?;
                let value = self.read_reg(dest_field)?;
                bus.write_word(addr, value)
            }
            4 => {
                // POPB
                let reg_index = Self::single_operand_reg_index(opcode, dest_field, operand_field);
                let value = self.pop_byte(bus)?;
                self.write_reg(reg_index, value as u16);
                Ok(())
            }
            5 => {
                // POP
                let reg_index = Self::single_operand_reg_index(opcode, dest_field, operand_field);
                let value = self.pop_word(bus)?;
                self.write_reg(reg_index, value);
                Ok(())
            }
            6 => {
                // PUSHB
                let reg_index = Self::single_operand_reg_index(opcode, dest_field, operand_field);
                let value = (self.read_reg(reg_index)? & 0xFF) as u8;
                self.push_byte(bus, value)
            }
            7 => {
                // PUSH
                let reg_index = Self::single_operand_reg_index(opcode, dest_field, operand_field);
                let value = self.read_reg(reg_index)?;
                self.push_word(bus, value)
            }
            _ => unreachable!("3-bit field"),
        }
    }
}

fn is_push_opcode(opcode: u8) -> bool {
    Some(opcode) == mnemonics::opcode_for_mnemonic("PUSH") || Some(opcode) == mnemonics::opcode_for_mnemonic("PUSHB")
}

fn decode_mode(bits: u8, pc: u16, word: u16) -> Result<AddressingMode, Error> {
    match bits {
        0 => Ok(AddressingMode::Imm4),
        1 => Ok(AddressingMode::Imm8),
        2 => Ok(AddressingMode::Imm16),
        3 => Ok(AddressingMode::Reg),
        4 => Ok(AddressingMode::IndirectReg),
        5 => Ok(AddressingMode::IndirectOffset),
        6 => Ok(AddressingMode::IndirectImm16),
        _ => Err(Error::DecodeFault { pc, opcode: word, message: "addressing mode 7 is reserved".to_string() }),
    }
}
