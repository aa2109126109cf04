//! Static disassembly: renders raw instruction bytes back into mnemonic
//! text. Grounded on `christiankuhl-em68k/src/processor.rs`'s
//! `CPU::disassemble` (address, raw opcode words, rendered text triple) and
//! `src/devices.rs`'s `ASMStream` print format; the bit layout mirrors
//! `emulator::cpu`'s decode step, read here from a plain byte slice rather
//! than a live bus.

use crate::assembler::operand::AddressingMode;
use crate::mnemonics;

fn decode_mode_bits(bits: u8) -> Option<AddressingMode> {
    match bits {
        0 => Some(AddressingMode::Imm4),
        1 => Some(AddressingMode::Imm8),
        2 => Some(AddressingMode::Imm16),
        3 => Some(AddressingMode::Reg),
        4 => Some(AddressingMode::IndirectReg),
        5 => Some(AddressingMode::IndirectOffset),
        6 => Some(AddressingMode::IndirectImm16),
        _ => None,
    }
}

fn reg_name(idx: u8) -> String {
    match idx {
        7 => "sp".to_string(),
        8 => "pc".to_string(),
        n => format!("r{n}"),
    }
}

fn read_word(bytes: &[u8], pos: usize) -> Option<u16> {
    let hi = *bytes.get(pos)?;
    let lo = *bytes.get(pos + 1)?;
    Some(((hi as u16) << 8) | lo as u16)
}

fn operand_text(bytes: &[u8], pos: &mut usize, operand_field: u8, mode: AddressingMode) -> String {
    match mode {
        AddressingMode::Imm4 => format!("{operand_field}"),
        AddressingMode::Imm8 => {
            let b = bytes.get(*pos).copied().unwrap_or(0);
            *pos += 1;
            format!("0x{b:02x}")
        }
        AddressingMode::Imm16 => {
            let w = read_word(bytes, *pos).unwrap_or(0);
            *pos += 2;
            format!("0x{w:04x}")
        }
        AddressingMode::Reg => reg_name(operand_field),
        AddressingMode::IndirectReg => format!("[{}]", reg_name(operand_field)),
        AddressingMode::IndirectOffset => {
            let w = read_word(bytes, *pos).unwrap_or(0) as i16;
            *pos += 2;
            if w < 0 {
                format!("[{} - {}]", reg_name(operand_field), -(w as i32))
            } else {
                format!("[{} + {w}]", reg_name(operand_field))
            }
        }
        AddressingMode::IndirectImm16 => {
            let w = read_word(bytes, *pos).unwrap_or(0);
            *pos += 2;
            format!("[0x{w:04x}]")
        }
    }
}

/// Decode one instruction starting at `offset`. Returns its byte length and
/// rendered text, or `None` if fewer than two bytes remain. Never fails on
/// malformed input: unknown opcodes and mode 7 render as `???` rather than
/// erroring, since this is a best-effort trace tool, not the CPU's decoder.
pub fn disassemble_one(bytes: &[u8], offset: usize) -> Option<(usize, String)> {
    let word = read_word(bytes, offset)?;
    let opcode = ((word >> 10) & 0x3F) as u8;
    let dest_field = ((word >> 7) & 0x7) as u8;
    let operand_field = ((word >> 3) & 0xF) as u8;
    let mode_bits = (word & 0x7) as u8;
    let mnemonic = mnemonics::mnemonic_for_opcode(opcode).unwrap_or("???");
    let mode = decode_mode_bits(mode_bits);
    let mut pos = offset + 2;

    let text = match mnemonics::operand_arity(mnemonic) {
        0 => mnemonic.to_string(),
        1 if mnemonic == "PUSH" || mnemonic == "PUSHB" => {
            format!("{mnemonic} {}", reg_name(operand_field))
        }
        1 if mnemonic == "POP" || mnemonic == "POPB" => {
            format!("{mnemonic} {}", reg_name(dest_field))
        }
        1 => match mode {
            Some(AddressingMode::Reg) => format!("{mnemonic} {}", reg_name(dest_field)),
            Some(m) => format!("{mnemonic} {}", operand_text(bytes, &mut pos, operand_field, m)),
            None => format!("{mnemonic} ???"),
        },
        _ => match mode {
            Some(m) => {
                format!("{mnemonic} {}, {}", reg_name(dest_field), operand_text(bytes, &mut pos, operand_field, m))
            }
            None => format!("{mnemonic} {}, ???", reg_name(dest_field)),
        },
    };
    Some((pos - offset, text))
}

/// Decode up to `max_instructions` starting at `base`, stopping early if the
/// byte slice runs out. Returns each instruction's address, raw opcode
/// words, and rendered text — the shape of the teacher's `CPU::disassemble`.
pub fn disassemble(bytes: &[u8], base: u16, max_instructions: usize) -> Vec<(u16, Vec<u16>, String)> {
    let mut out = Vec::new();
    let mut offset = 0usize;
    for _ in 0..max_instructions {
        let (len, text) = match disassemble_one(bytes, offset) {
            Some(pair) => pair,
            None => break,
        };
        let mut words = Vec::new();
        let mut w = 0usize;
        while w < len {
            if let Some(word) = read_word(bytes, offset + w) {
                words.push(word);
            }
            w += 2;
        }
        out.push((base.wrapping_add(offset as u16), words, text));
        offset += len;
        if offset >= bytes.len() {
            break;
        }
    }
    out
}
