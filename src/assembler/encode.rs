//! Bit-packing encoder, spec.md §4.2.1. Grounded on
//! `original_source/src/assembler/assembler.py::encode_program`.

use crate::assembler::operand::{AddressingMode, Operand};
use crate::assembler::program::ProgramEntry;
use crate::error::Error;
use crate::mnemonics;

/// The "natural" 4-bit field value for a resolved operand under `mode`,
/// plus any trailing immediate bytes. Whether this value lands in the
/// dest field or the operand field is decided by the caller, since that
/// depends on arity and the PUSH/PUSHB field-width exception.
fn operand_field(
    file: &str,
    line: usize,
    mode: AddressingMode,
    op: &Operand,
) -> Result<(u16, Vec<u8>), Error> {
    let mismatch = || Error::Syntax {
        file: file.to_string(),
        line,
        message: format!("operand {op:?} does not match addressing mode {mode:?}"),
    };
    match (mode, op) {
        (AddressingMode::Imm4, Operand::Number(n)) => Ok(((*n & 0xF), vec![])),
        (AddressingMode::Imm8, Operand::Number(n)) => Ok((0, vec![(*n & 0xFF) as u8])),
        (AddressingMode::Imm16, Operand::Number(n)) => Ok((0, n.to_be_bytes().to_vec())),
        (AddressingMode::Reg, Operand::Register(r)) => Ok((*r as u16, vec![])),
        (AddressingMode::IndirectReg, Operand::Indirect(inner)) => match inner.as_ref() {
            Operand::Register(r) => Ok((*r as u16, vec![])),
            _ => Err(mismatch()),
        },
        (AddressingMode::IndirectOffset, Operand::IndirectOffset { reg, imm16 }) => {
            Ok((*reg as u16, imm16.to_be_bytes().to_vec()))
        }
        (AddressingMode::IndirectImm16, Operand::Indirect(inner)) => match inner.as_ref() {
            Operand::Number(n) => Ok((0, n.to_be_bytes().to_vec())),
            _ => Err(mismatch()),
        },
        _ => Err(mismatch()),
    }
}

/// Encode one program entry into its final bytes.
pub fn encode_entry(entry: &ProgramEntry) -> Result<Vec<u8>, Error> {
    match entry {
        ProgramEntry::Data { bytes, .. } => Ok(bytes.clone()),
        ProgramEntry::Instruction { mnemonic, opcode, dest, operand, mode, file, line, .. } => {
            let (dest_field, operand_bits, extra) = match (operand, mode) {
                (None, None) => (0u16, 0u16, Vec::new()),
                (Some(op), Some(m)) => {
                    let (field_value, extra) = operand_field(file, *line, *m, op)?;
                    let (dest_field, operand_field_val) = match dest {
                        Some(d) => (*d as u16, field_value),
                        None => {
                            if *m == AddressingMode::Reg && !mnemonics::uses_wide_reg_field(mnemonic) {
                                (field_value, 0)
                            } else {
                                (0, field_value)
                            }
                        }
                    };
                    (dest_field, operand_field_val, extra)
                }
                _ => {
                    return Err(Error::Syntax {
                        file: file.clone(),
                        line: *line,
                        message: format!("'{mnemonic}' has inconsistent operand/mode state"),
                    })
                }
            };
            let mode_bits = mode.map(|m| m.bits()).unwrap_or(0);
            let word = ((*opcode as u16) << 10)
                | ((dest_field & 0x7) << 7)
                | ((operand_bits & 0xF) << 3)
                | mode_bits;
            let mut out = word.to_be_bytes().to_vec();
            out.extend(extra);
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instr(
        mnemonic: &str,
        opcode: u8,
        dest: Option<u8>,
        operand: Option<Operand>,
        mode: Option<AddressingMode>,
    ) -> ProgramEntry {
        ProgramEntry::Instruction {
            mnemonic: mnemonic.to_string(),
            opcode,
            address: 0,
            dest,
            operand,
            mode,
            length: 0,
            file: "t.asm".into(),
            line: 1,
        }
    }

    #[test]
    fn mov_imm16_encodes_dest_and_word() {
        let entry = instr("MOV", 0b00_0011, Some(0), Some(Operand::Number(0xFE73)), Some(AddressingMode::Imm16));
        let bytes = encode_entry(&entry).unwrap();
        assert_eq!(bytes, vec![0x0C, 0x02, 0xFE, 0x73]);
    }

    #[test]
    fn push_uses_wide_register_field() {
        let entry = instr(
            "PUSH",
            0b101_111,
            None,
            Some(Operand::Register(3)),
            Some(AddressingMode::Reg),
        );
        let bytes = encode_entry(&entry).unwrap();
        let word = u16::from_be_bytes([bytes[0], bytes[1]]);
        assert_eq!((word >> 7) & 0x7, 0, "dest field must be zero for PUSH");
        assert_eq!((word >> 3) & 0xF, 3, "register goes in the 4-bit operand field");
        assert_eq!(word & 0x7, AddressingMode::Reg.bits());
    }

    #[test]
    fn pop_places_register_in_dest_field() {
        let entry = instr(
            "POP",
            0b101_101,
            None,
            Some(Operand::Register(2)),
            Some(AddressingMode::Reg),
        );
        let bytes = encode_entry(&entry).unwrap();
        let word = u16::from_be_bytes([bytes[0], bytes[1]]);
        assert_eq!((word >> 7) & 0x7, 2);
        assert_eq!((word >> 3) & 0xF, 0);
    }

    #[test]
    fn indirect_offset_trails_signed_word() {
        let entry = instr(
            "LOADB",
            0b101_000,
            Some(3),
            Some(Operand::IndirectOffset { reg: 2, imm16: 0xFFFF }),
            Some(AddressingMode::IndirectOffset),
        );
        let bytes = encode_entry(&entry).unwrap();
        assert_eq!(bytes.len(), 4);
        assert_eq!(&bytes[2..4], &[0xFF, 0xFF]);
    }
}
