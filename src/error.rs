use std::fmt;

/// Errors raised while assembling source or running the emulator.
///
/// `Halt` and clean step-count exhaustion are *not* represented here; see
/// [`crate::emulator::StopReason`] for the non-error terminal conditions of
/// `run()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed tokens, unknown mnemonic/directive, illegal operand shape,
    /// local label without a preceding global label, reserved name reuse.
    Syntax { file: String, line: usize, message: String },
    /// A `symbol_ref` operand survived the resolve pass.
    UnresolvedSymbol { file: String, line: usize, name: String },
    /// An entry's recorded address disagreed with the emission cursor; a
    /// length-calculator bug. Internal, should never surface in practice.
    EncodeMismatch { expected: usize, actual: usize },
    /// Read/write to an unmapped address, or to a device in violation of
    /// its `IoType`.
    BusFault { address: u16, message: String },
    /// Undefined opcode within a class, or addressing mode 7.
    DecodeFault { pc: u16, opcode: u16, message: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Syntax { file, line, message } => {
                write!(f, "{file}:{line}: syntax error: {message}")
            }
            Error::UnresolvedSymbol { file, line, name } => {
                write!(f, "{file}:{line}: unresolved symbol '{name}'")
            }
            Error::EncodeMismatch { expected, actual } => write!(
                f,
                "encode mismatch: expected cursor at {expected:#06x}, emitted {actual:#06x} bytes"
            ),
            Error::BusFault { address, message } => {
                write!(f, "bus fault at {address:#06x}: {message}")
            }
            Error::DecodeFault { pc, opcode, message } => {
                write!(f, "decode fault at {pc:#06x} (opcode {opcode:#06x}): {message}")
            }
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// Why a call to [`crate::emulator::Emulator::run`] returned without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The CPU executed `HALT`.
    Halt,
    /// `steps` instructions were executed without hitting `HALT`.
    StepsExhausted,
    /// `max_cycles` was reached before `HALT`.
    CycleLimit,
}
