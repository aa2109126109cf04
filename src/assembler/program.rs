//! In-memory program representation and symbol table, per spec.md §3.

use std::collections::HashMap;

use crate::assembler::operand::{AddressingMode, Operand};

/// One assembled line, tagged per spec.md §3's "Program entries".
///
/// Grounded on `original_source/src/assembler/parser.py` (the list the
/// parser appends to) and `.../assembler.py::encode_program` (how entries
/// are later consumed).
#[derive(Debug, Clone)]
pub enum ProgramEntry {
    Instruction {
        mnemonic: String,
        opcode: u8,
        address: u16,
        dest: Option<u8>,
        operand: Option<Operand>,
        mode: Option<AddressingMode>,
        length: usize,
        file: String,
        line: usize,
    },
    Data {
        bytes: Vec<u8>,
        address: u16,
        file: String,
        line: usize,
    },
}

impl ProgramEntry {
    pub fn address(&self) -> u16 {
        match self {
            ProgramEntry::Instruction { address, .. } => *address,
            ProgramEntry::Data { address, .. } => *address,
        }
    }

    pub fn length(&self) -> usize {
        match self {
            ProgramEntry::Instruction { length, .. } => *length,
            ProgramEntry::Data { bytes, .. } => bytes.len(),
        }
    }
}

/// A bound symbol value. Distinguishing label addresses from `@let`
/// scalars matters only for diagnostics; both resolve to a `u16` operand
/// value in the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolValue {
    Address(u16),
    Scalar(u16),
}

impl SymbolValue {
    pub fn value(self) -> u16 {
        match self {
            SymbolValue::Address(v) => v,
            SymbolValue::Scalar(v) => v,
        }
    }
}

/// Maps symbol name -> bound value. Grounded on
/// `original_source/src/assembler/assembler.py`'s `self.symbols` dict.
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: HashMap<String, SymbolValue>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self { symbols: HashMap::new() }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<SymbolValue> {
        self.symbols.get(name).copied()
    }

    /// Bind `name`, failing if it is already bound (duplicate labels/lets
    /// are a syntax error per spec.md §3).
    pub fn bind(&mut self, name: String, value: SymbolValue) -> Result<(), String> {
        if self.symbols.contains_key(&name) {
            return Err(format!("symbol '{name}' already defined"));
        }
        self.symbols.insert(name, value);
        Ok(())
    }
}

/// Tracks the most recent global label so `.local` labels and references
/// can be rewritten to `<scope>.local`, per spec.md §3. Parser-local state,
/// per DESIGN.md's "Global state" resolution — never a process-global.
#[derive(Debug, Default)]
pub struct Scope {
    current: Option<String>,
}

impl Scope {
    pub fn new() -> Self {
        Self { current: None }
    }

    pub fn set_global(&mut self, name: String) {
        self.current = Some(name);
    }

    /// Rewrite a local name (without its leading `.`) into its namespaced
    /// form, failing if no global label has been seen yet.
    pub fn qualify_local(&self, local: &str) -> Result<String, String> {
        match &self.current {
            Some(scope) => Ok(format!("{scope}.{local}")),
            None => Err(format!("local label '.{local}' has no preceding global label")),
        }
    }
}
