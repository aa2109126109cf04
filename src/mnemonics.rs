//! Opcode and register name tables shared by the parser, encoder, and CPU.
//!
//! Ground truth: `original_source/src/assembler/parser.py`'s `OPCODES` and
//! `REGISTERS` dicts.

/// Register name -> index (0..=8). `sp` and `pc` alias R7/R8.
pub const REGISTERS: &[(&str, u8)] = &[
    ("r0", 0),
    ("r1", 1),
    ("r2", 2),
    ("r3", 3),
    ("r4", 4),
    ("r5", 5),
    ("r6", 6),
    ("r7", 7),
    ("sp", 7),
    ("pc", 8),
];

pub fn register_index(name: &str) -> Option<u8> {
    REGISTERS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, idx)| *idx)
}

/// True if `name` (case-insensitively) names a register or its alias.
/// Used to reject reserved symbol names in `@let` and label definitions.
pub fn is_register_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    REGISTERS.iter().any(|(n, _)| *n == lower)
}

/// Mnemonic -> 6-bit opcode. `INC`/`DEC` are kept as aliases for `ADD`/`SUB`
/// per DESIGN.md's Open Question resolution (imm4 forms only, in practice —
/// nothing stops `INC r0, r1` either, since the alias is purely mnemonic).
pub const OPCODES: &[(&str, u8)] = &[
    ("NOP", 0b00_0000),
    ("HALT", 0b00_0001),
    ("RET", 0b00_0010),
    ("MOV", 0b00_0011),
    ("ADD", 0b01_0000),
    ("INC", 0b01_0000),
    ("SUB", 0b01_0001),
    ("DEC", 0b01_0001),
    ("MUL", 0b01_0010),
    ("MULH", 0b01_0011),
    ("AND", 0b01_0100),
    ("OR", 0b01_0101),
    ("XOR", 0b01_0110),
    ("SHL", 0b01_0111),
    ("ROL", 0b01_1000),
    ("SHR", 0b01_1001),
    ("ASR", 0b01_1010),
    ("ROR", 0b01_1011),
    ("CMP", 0b01_1100),
    ("NOT", 0b01_1101),
    ("NEG", 0b01_1110),
    ("JMP", 0b100_000),
    ("JZ", 0b100_001),
    ("JEQ", 0b100_001),
    ("JNZ", 0b100_010),
    ("JNE", 0b100_010),
    ("JLT", 0b100_011),
    ("JGT", 0b100_100),
    ("JC", 0b100_101),
    ("JNC", 0b100_110),
    ("CALL", 0b100_111),
    ("LOADB", 0b101_000),
    ("LOAD", 0b101_001),
    ("STOREB", 0b101_010),
    ("STORE", 0b101_011),
    ("POPB", 0b101_100),
    ("POP", 0b101_101),
    ("PUSHB", 0b101_110),
    ("PUSH", 0b101_111),
];

pub fn opcode_for_mnemonic(mnemonic: &str) -> Option<u8> {
    OPCODES
        .iter()
        .find(|(n, _)| *n == mnemonic)
        .map(|(_, op)| *op)
}

/// Reverse lookup for the disassembler: opcode -> canonical mnemonic.
/// Aliased opcodes (`INC`/`ADD`, `JEQ`/`JZ`, ...) resolve to whichever name
/// comes first in `OPCODES`, which is always the canonical spelling.
pub fn mnemonic_for_opcode(opcode: u8) -> Option<&'static str> {
    OPCODES.iter().find(|(_, op)| *op == opcode).map(|(n, _)| *n)
}

/// Mnemonics whose `reg`-mode source register sits in the 4-bit field
/// (bits 6:3) rather than the usual 3-bit field (bits 9:7). See spec.md §9,
/// "PUSH register-field width".
pub fn uses_wide_reg_field(mnemonic: &str) -> bool {
    matches!(mnemonic, "PUSH" | "PUSHB")
}

/// Number of operand tokens an instruction takes on the source line: 0 for
/// the niladic general ops, 1 for jumps/call/push/pop (a single addressed
/// operand, no separate destination register), 2 for everything else
/// (`dest, operand`). See spec.md §4.2.1's per-mode field table.
pub fn operand_arity(mnemonic: &str) -> usize {
    match mnemonic {
        "NOP" | "HALT" | "RET" => 0,
        "JMP" | "JZ" | "JEQ" | "JNZ" | "JNE" | "JLT" | "JGT" | "JC" | "JNC" | "CALL" | "PUSH"
        | "PUSHB" | "POP" | "POPB" => 1,
        _ => 2,
    }
}

pub fn register_name(index: u8) -> &'static str {
    match index {
        0 => "R0",
        1 => "R1",
        2 => "R2",
        3 => "R3",
        4 => "R4",
        5 => "R5",
        6 => "R6",
        7 => "SP",
        8 => "PC",
        _ => "?",
    }
}
