//! Line tokenizer, directive/label/instruction dispatch, operand parsing,
//! and instruction-length calculation. Grounded on
//! `original_source/src/assembler/parser.py`
//! (`parse_line`/`parse_instruction`/`parse_operands`/`get_instruction_length`).

use std::collections::{HashMap, VecDeque};

use crate::assembler::operand::{AddressingMode, Operand};
use crate::assembler::program::{ProgramEntry, Scope, SymbolTable, SymbolValue};
use crate::charset::{unescape, CharSet};
use crate::error::Error;
use crate::mnemonics;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    LBracket,
    RBracket,
    /// Quoted literal, escapes already resolved.
    Quoted(String),
    Word(String),
}

/// Split one already comment-stripped line into tokens. `[` and `]` are
/// always their own token; quoted spans (single or double) run to their
/// closing quote with `\n \t \0 \\ \' \"` escapes resolved; everything
/// else is a whitespace/comma-separated run.
fn tokenize(line: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();
    let mut current = String::new();

    fn flush(current: &mut String, tokens: &mut Vec<Token>) {
        if !current.is_empty() {
            tokens.push(Token::Word(std::mem::take(current)));
        }
    }

    while let Some(c) = chars.next() {
        match c {
            ' ' | '\t' | '\r' | '\n' | ',' => flush(&mut current, &mut tokens),
            '[' => {
                flush(&mut current, &mut tokens);
                tokens.push(Token::LBracket);
            }
            ']' => {
                flush(&mut current, &mut tokens);
                tokens.push(Token::RBracket);
            }
            '\'' | '"' => {
                flush(&mut current, &mut tokens);
                let quote = c;
                let mut raw = String::new();
                let mut closed = false;
                while let Some(&next) = chars.peek() {
                    chars.next();
                    if next == '\\' {
                        raw.push('\\');
                        if let Some(escaped) = chars.next() {
                            raw.push(escaped);
                        }
                        continue;
                    }
                    if next == quote {
                        closed = true;
                        break;
                    }
                    raw.push(next);
                }
                if !closed {
                    return Err(format!("unterminated {quote} string literal"));
                }
                tokens.push(Token::Quoted(unescape(&raw)));
            }
            ';' => break,
            other => current.push(other),
        }
    }
    flush(&mut current, &mut tokens);
    Ok(tokens)
}

/// Strip the comment-to-end-of-line at the first unquoted `;`.
fn strip_comment(line: &str) -> &str {
    let mut in_quote: Option<char> = None;
    let mut escape = false;
    for (i, c) in line.char_indices() {
        if escape {
            escape = false;
            continue;
        }
        match in_quote {
            Some(q) => {
                if c == '\\' {
                    escape = true;
                } else if c == q {
                    in_quote = None;
                }
            }
            None => match c {
                '\'' | '"' => in_quote = Some(c),
                ';' => return &line[..i],
                _ => {}
            },
        }
    }
    line
}

fn parse_number(text: &str) -> Result<u16, String> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16).map_err(|_| format!("invalid hex literal '{text}'"))
    } else if let Some(bin) = text.strip_prefix("0b").or_else(|| text.strip_prefix("0B")) {
        u16::from_str_radix(bin, 2).map_err(|_| format!("invalid binary literal '{text}'"))
    } else {
        text.parse::<u16>().map_err(|_| format!("invalid decimal literal '{text}'"))
    }
}

fn looks_numeric(text: &str) -> bool {
    text.starts_with(|c: char| c.is_ascii_digit())
}

/// Per-file, per-line parse state threaded through `parse_line`. Owns the
/// running program, symbol table, `@let` bindings, and import queue; none
/// of this is process-global (spec.md §9's "Global state" note).
pub struct ParseState {
    pub program: Vec<ProgramEntry>,
    pub symbols: SymbolTable,
    pub lets: HashMap<String, String>,
    pub scope: Scope,
    pub pc: u16,
    pub charset: CharSet,
    pub imports: VecDeque<String>,
}

impl ParseState {
    pub fn new(charset: CharSet) -> Self {
        Self {
            program: Vec::new(),
            symbols: SymbolTable::new(),
            lets: HashMap::new(),
            scope: Scope::new(),
            pc: 0,
            charset,
            imports: VecDeque::new(),
        }
    }
}

fn syntax_err(file: &str, line: usize, message: impl Into<String>) -> Error {
    Error::Syntax { file: file.to_string(), line, message: message.into() }
}

/// Parse one source file's text, appending to `state` in place. `file` is
/// used only for diagnostics.
pub fn parse_file_text(state: &mut ParseState, file: &str, text: &str) -> Result<(), Error> {
    for (idx, raw_line) in text.lines().enumerate() {
        let lineno = idx + 1;
        let stripped = strip_comment(raw_line);
        if stripped.trim().is_empty() {
            continue;
        }
        let tokens = tokenize(stripped).map_err(|m| syntax_err(file, lineno, m))?;
        if tokens.is_empty() {
            continue;
        }
        parse_line(state, file, lineno, &tokens)?;
    }
    Ok(())
}

fn parse_line(
    state: &mut ParseState,
    file: &str,
    lineno: usize,
    tokens: &[Token],
) -> Result<(), Error> {
    match &tokens[0] {
        Token::Word(w) if w.starts_with('@') => parse_directive(state, file, lineno, w, &tokens[1..]),
        Token::Word(w) if w.ends_with(':') => {
            parse_label(state, file, lineno, &w[..w.len() - 1])?;
            if tokens.len() > 1 {
                parse_line(state, file, lineno, &tokens[1..])
            } else {
                Ok(())
            }
        }
        Token::Word(mnemonic) => parse_instruction(state, file, lineno, mnemonic, &tokens[1..]),
        other => Err(syntax_err(file, lineno, format!("unexpected token {other:?} at line start"))),
    }
}

fn parse_label(state: &mut ParseState, file: &str, lineno: usize, name: &str) -> Result<(), Error> {
    if name.is_empty() {
        return Err(syntax_err(file, lineno, "empty label name"));
    }
    let (qualified, is_global) = if let Some(local) = name.strip_prefix('.') {
        let qualified = state
            .scope
            .qualify_local(local)
            .map_err(|m| syntax_err(file, lineno, m))?;
        (qualified, false)
    } else {
        if !name.chars().next().unwrap().is_ascii_alphabetic() {
            return Err(syntax_err(file, lineno, format!("label '{name}' must start with a letter")));
        }
        (name.to_string(), true)
    };
    if mnemonics::is_register_name(name.trim_start_matches('.')) {
        return Err(syntax_err(file, lineno, format!("label '{name}' reuses a register name")));
    }
    state
        .symbols
        .bind(qualified, SymbolValue::Address(state.pc))
        .map_err(|m| syntax_err(file, lineno, m))?;
    if is_global {
        state.scope.set_global(name.to_string());
    }
    Ok(())
}

fn parse_directive(
    state: &mut ParseState,
    file: &str,
    lineno: usize,
    directive: &str,
    rest: &[Token],
) -> Result<(), Error> {
    match directive {
        "@let" => {
            if rest.len() != 3 {
                return Err(syntax_err(file, lineno, "expected '@let NAME = VALUE'"));
            }
            let name = match &rest[0] {
                Token::Word(w) => w.clone(),
                _ => return Err(syntax_err(file, lineno, "'@let' name must be a bare word")),
            };
            match &rest[1] {
                Token::Word(eq) if eq == "=" => {}
                _ => return Err(syntax_err(file, lineno, "expected '=' in '@let'")),
            }
            let value = match &rest[2] {
                Token::Word(w) => w.clone(),
                Token::Quoted(s) => s.clone(),
                _ => return Err(syntax_err(file, lineno, "invalid '@let' value")),
            };
            if mnemonics::is_register_name(&name) {
                return Err(syntax_err(file, lineno, format!("'@let' name '{name}' reuses a register name")));
            }
            if state.lets.contains_key(&name) {
                return Err(syntax_err(file, lineno, format!("'@let {name}' already defined")));
            }
            state.lets.insert(name, value);
            Ok(())
        }
        "@data" => {
            let mut bytes = Vec::new();
            for tok in rest {
                match tok {
                    Token::Quoted(s) => bytes.extend(state.charset.encode_str(s)),
                    Token::Word(w) => {
                        let n = parse_number(w).map_err(|m| syntax_err(file, lineno, m))?;
                        bytes.push((n & 0xFF) as u8);
                    }
                    other => return Err(syntax_err(file, lineno, format!("unexpected token {other:?} in '@data'"))),
                }
            }
            let address = state.pc;
            state.pc = state.pc.wrapping_add(bytes.len() as u16);
            state.program.push(ProgramEntry::Data {
                bytes,
                address,
                file: file.to_string(),
                line: lineno,
            });
            Ok(())
        }
        "@import" => {
            if rest.len() != 1 {
                return Err(syntax_err(file, lineno, "expected '@import \"FILE\"'"));
            }
            let name = match &rest[0] {
                Token::Quoted(s) => s.clone(),
                _ => return Err(syntax_err(file, lineno, "'@import' target must be a quoted path")),
            };
            state.imports.push_back(name);
            Ok(())
        }
        other => Err(syntax_err(file, lineno, format!("unknown directive '{other}'"))),
    }
}

/// Resolve a bare word to an operand, recursing into `@let` aliases.
/// `depth` guards against a self-referential `@let` chain.
fn resolve_word_operand(
    state: &ParseState,
    file: &str,
    lineno: usize,
    word: &str,
    depth: usize,
) -> Result<Operand, Error> {
    if depth > 16 {
        return Err(syntax_err(file, lineno, format!("'@let' alias '{word}' recurses too deeply")));
    }
    if let Some(local) = word.strip_prefix('.') {
        let qualified = state
            .scope
            .qualify_local(local)
            .map_err(|m| syntax_err(file, lineno, m))?;
        return Ok(Operand::SymbolRef(qualified));
    }
    if let Some(idx) = mnemonics::register_index(word) {
        return Ok(Operand::Register(idx));
    }
    if looks_numeric(word) {
        let n = parse_number(word).map_err(|m| syntax_err(file, lineno, m))?;
        return Ok(Operand::Number(n));
    }
    if let Some(value) = state.lets.get(word) {
        let inner_tokens = tokenize(value).map_err(|m| syntax_err(file, lineno, m))?;
        if inner_tokens.len() == 1 {
            return resolve_token_operand(state, file, lineno, &inner_tokens[0], depth + 1);
        }
        return Err(syntax_err(file, lineno, format!("'@let {word}' value is not a single operand")));
    }
    if !word.chars().next().map(|c| c.is_ascii_alphabetic()).unwrap_or(false) {
        return Err(syntax_err(file, lineno, format!("invalid operand token '{word}'")));
    }
    Ok(Operand::SymbolRef(word.to_string()))
}

fn resolve_token_operand(
    state: &ParseState,
    file: &str,
    lineno: usize,
    token: &Token,
    depth: usize,
) -> Result<Operand, Error> {
    match token {
        Token::Word(w) => resolve_word_operand(state, file, lineno, w, depth),
        Token::Quoted(s) => {
            let bytes = state.charset.encode_str(s);
            let first = bytes.first().copied().unwrap_or(0);
            Ok(Operand::Number(first as u16))
        }
        other => Err(syntax_err(file, lineno, format!("unexpected token {other:?} in operand"))),
    }
}

/// Parse one operand, consuming either a single token or a full
/// `[ ... ]` group from `iter`.
fn parse_one_operand<'a, I>(
    state: &ParseState,
    file: &str,
    lineno: usize,
    iter: &mut std::iter::Peekable<I>,
) -> Result<Operand, Error>
where
    I: Iterator<Item = &'a Token>,
{
    match iter.next() {
        Some(Token::LBracket) => {
            let mut inner = Vec::new();
            loop {
                match iter.next() {
                    Some(Token::RBracket) => break,
                    Some(t) => inner.push(t),
                    None => return Err(syntax_err(file, lineno, "unterminated '['")),
                }
            }
            parse_bracket_group(state, file, lineno, &inner)
        }
        Some(tok) => resolve_token_operand(state, file, lineno, tok, 0),
        None => Err(syntax_err(file, lineno, "expected an operand")),
    }
}

fn split_embedded_sign(word: &str) -> Option<(&str, char, &str)> {
    for (i, c) in word.char_indices().skip(1) {
        if c == '+' || c == '-' {
            return Some((&word[..i], c, &word[i + c.len_utf8()..]));
        }
    }
    None
}

fn parse_bracket_group(
    state: &ParseState,
    file: &str,
    lineno: usize,
    inner: &[&Token],
) -> Result<Operand, Error> {
    let (left, sign, right): (Operand, Option<char>, Option<Operand>) = match inner {
        [Token::Word(w)] => {
            if let Some((l, s, r)) = split_embedded_sign(w) {
                let left = resolve_word_operand(state, file, lineno, l, 0)?;
                let right = resolve_word_operand(state, file, lineno, r, 0)?;
                (left, Some(s), Some(right))
            } else {
                (resolve_word_operand(state, file, lineno, w, 0)?, None, None)
            }
        }
        [only] => (resolve_token_operand(state, file, lineno, only, 0)?, None, None),
        [a, Token::Word(w)] if w.starts_with('+') || w.starts_with('-') => {
            let sign = w.chars().next().unwrap();
            let right = resolve_word_operand(state, file, lineno, &w[1..], 0)?;
            (resolve_token_operand(state, file, lineno, a, 0)?, Some(sign), Some(right))
        }
        [a, Token::Word(w), b] if w == "+" || w == "-" => {
            let sign = w.chars().next().unwrap();
            let left = resolve_token_operand(state, file, lineno, a, 0)?;
            let right = resolve_token_operand(state, file, lineno, b, 0)?;
            (left, Some(sign), Some(right))
        }
        _ => return Err(syntax_err(file, lineno, "malformed '[...]' operand")),
    };

    match (left, sign, right) {
        (single, None, None) => Ok(Operand::Indirect(Box::new(single))),
        (a, Some(s), Some(b)) => {
            let (reg, imm) = match (&a, &b) {
                (Operand::Register(r), Operand::Number(n)) => (*r, *n),
                (Operand::Number(n), Operand::Register(r)) => (*r, *n),
                _ => {
                    return Err(syntax_err(
                        file,
                        lineno,
                        "'[A+-B]' requires exactly one register and one immediate",
                    ))
                }
            };
            let signed_imm = if s == '-' {
                (imm as i32).wrapping_neg() as u16
            } else {
                imm
            };
            Ok(Operand::IndirectOffset { reg, imm16: signed_imm })
        }
        _ => unreachable!(),
    }
}

fn parse_instruction(
    state: &mut ParseState,
    file: &str,
    lineno: usize,
    mnemonic_raw: &str,
    rest: &[Token],
) -> Result<(), Error> {
    let mnemonic = mnemonic_raw.to_ascii_uppercase();
    let opcode = mnemonics::opcode_for_mnemonic(&mnemonic)
        .ok_or_else(|| syntax_err(file, lineno, format!("unknown mnemonic '{mnemonic_raw}'")))?;
    let arity = mnemonics::operand_arity(&mnemonic);

    let mut iter = rest.iter().peekable();
    let mut dest: Option<u8> = None;
    let mut operand: Option<Operand> = None;

    if arity == 2 {
        let first = parse_one_operand(state, file, lineno, &mut iter)?;
        let reg = match first {
            Operand::Register(r) => r,
            _ => return Err(syntax_err(file, lineno, format!("'{mnemonic}' destination must be a register"))),
        };
        dest = Some(reg);
    }
    if arity >= 1 {
        operand = Some(parse_one_operand(state, file, lineno, &mut iter)?);
    }
    if iter.peek().is_some() {
        return Err(syntax_err(file, lineno, format!("'{mnemonic}' takes {arity} operand(s)")));
    }

    let mode = operand.as_ref().map(|op| op.addressing_mode());
    let length = 2 + mode.map(|m| m.extra_bytes()).unwrap_or(0);
    let address = state.pc;
    state.pc = state.pc.wrapping_add(length as u16);

    state.program.push(ProgramEntry::Instruction {
        mnemonic,
        opcode,
        address,
        dest,
        operand,
        mode,
        length,
        file: file.to_string(),
        line: lineno,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok_words(line: &str) -> Vec<String> {
        tokenize(line)
            .unwrap()
            .into_iter()
            .map(|t| match t {
                Token::Word(w) => w,
                Token::Quoted(s) => s,
                Token::LBracket => "[".into(),
                Token::RBracket => "]".into(),
            })
            .collect()
    }

    #[test]
    fn tokenizes_brackets_and_commas() {
        assert_eq!(tok_words("MOV r0, [r1 + 2]"), vec!["MOV", "r0", "[", "r1", "+", "2", "]"]);
    }

    #[test]
    fn strips_comment_outside_quotes() {
        assert_eq!(strip_comment("MOV r0, 1 ; comment ; more"), "MOV r0, 1 ");
        assert_eq!(strip_comment("@data \"a;b\" ; real comment"), "@data \"a;b\" ");
    }

    #[test]
    fn parses_halt_then_mov_program() {
        let mut state = ParseState::new(CharSet::Cp437);
        parse_file_text(&mut state, "t.asm", "HALT\nMOV r1, 0x1234\n").unwrap();
        assert_eq!(state.program.len(), 2);
        match &state.program[1] {
            ProgramEntry::Instruction { mnemonic, dest, mode, length, .. } => {
                assert_eq!(mnemonic, "MOV");
                assert_eq!(*dest, Some(1));
                assert_eq!(*mode, Some(AddressingMode::Imm16));
                assert_eq!(*length, 4);
            }
            _ => panic!("expected instruction"),
        }
    }

    #[test]
    fn indirect_offset_with_spaces_folds_sign() {
        let mut state = ParseState::new(CharSet::Cp437);
        parse_file_text(&mut state, "t.asm", "LOADB r3, [r2 - 1]\n").unwrap();
        match &state.program[0] {
            ProgramEntry::Instruction { operand: Some(Operand::IndirectOffset { reg, imm16 }), .. } => {
                assert_eq!(*reg, 2);
                assert_eq!(*imm16, 0xFFFF);
            }
            other => panic!("unexpected entry {other:?}"),
        }
    }

    #[test]
    fn local_label_requires_scope() {
        let mut state = ParseState::new(CharSet::Cp437);
        let err = parse_file_text(&mut state, "t.asm", ".local:\nNOP\n").unwrap_err();
        assert!(matches!(err, Error::Syntax { .. }));
    }

    #[test]
    fn let_alias_resolves_recursively() {
        let mut state = ParseState::new(CharSet::Cp437);
        parse_file_text(&mut state, "t.asm", "@let FOO = 0x20\nMOV r0, FOO\n").unwrap();
        match &state.program[0] {
            ProgramEntry::Instruction { operand: Some(Operand::Number(n)), .. } => assert_eq!(*n, 0x20),
            other => panic!("unexpected entry {other:?}"),
        }
    }
}
