/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::opcode::{Opcode, Operand};
use crate::program::{Program, ProgramError};
use crate::vm::CODE_SIZE;
use codespan_reporting::diagnostic::{Diagnostic, Label};
use codespan_reporting::files::SimpleFile;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{Buffer, ColorChoice, StandardStream};
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::ops::Range;
use std::str::FromStr;
use utils::hash::HashMap;
use utils::swrite;

#[derive(Debug, Clone)]
pub struct AssembleError {
    kind: AssembleErrorKind,
    span: Range<usize>,
    lineno: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssembleErrorKind {
    UnknownInstruction(String),
    MissingOperand(Opcode),
    InvalidOperand(String),
    OperandOutOfRange { op: Opcode, value: i64 },
    UndefinedLabel(String),
    DuplicateLabel(String),
    ProgramTooLarge(usize),
}

#[derive(Debug, Clone, Copy)]
struct Token<'a> {
    text: &'a str,
    span: (usize, usize),
    lineno: usize,
}

impl Token<'_> {
    fn range(&self) -> Range<usize> {
        self.span.0..self.span.1
    }
}

#[derive(Debug)]
struct Line<'a> {
    op: Opcode,
    op_token: Token<'a>,
    operand: Option<Token<'a>>,
}

/// Assembles whitespace-separated mnemonics into bytecode.
///
/// Operands are decimal (or `0x` hex) integers. Jump and call targets may
/// also be written as labels, declared with a trailing colon (`loop:`).
/// Comments run from `;` or `#` to the end of the line.
pub fn assemble(source: &str) -> Result<Program, AssembleError> {
    let tokens = tokenize(source);

    // first pass: decode mnemonics and lay out label addresses
    let mut labels: HashMap<&str, i32> = HashMap::default();
    let mut lines = Vec::new();
    let mut offset = 0usize;
    let mut iter = tokens.into_iter();
    while let Some(token) = iter.next() {
        if let Some(name) = token.text.strip_suffix(':') {
            if !is_label(name) {
                return Err(AssembleError::new(
                    AssembleErrorKind::InvalidOperand(token.text.to_string()),
                    token,
                ));
            }
            if labels.insert(name, offset as i32).is_some() {
                return Err(AssembleError::new(
                    AssembleErrorKind::DuplicateLabel(name.to_string()),
                    token,
                ));
            }
            continue;
        }

        let Ok(op) = Opcode::from_str(token.text) else {
            return Err(AssembleError::new(
                AssembleErrorKind::UnknownInstruction(token.text.to_string()),
                token,
            ));
        };
        let operand = match op.operand() {
            Operand::None => None,
            _ => match iter.next() {
                Some(t) if !t.text.ends_with(':') => Some(t),
                _ => {
                    return Err(AssembleError::new(
                        AssembleErrorKind::MissingOperand(op),
                        token,
                    ));
                }
            },
        };
        offset += op.width();
        lines.push(Line {
            op,
            op_token: token,
            operand,
        });
    }

    if offset > CODE_SIZE {
        let last = lines.last().map(|l| l.op_token);
        let err = AssembleErrorKind::ProgramTooLarge(offset);
        return Err(match last {
            Some(token) => AssembleError::new(err, token),
            None => AssembleError {
                kind: err,
                span: 0..0,
                lineno: 1,
            },
        });
    }

    // second pass: encode
    let mut code = Vec::with_capacity(offset);
    for line in &lines {
        code.push(line.op as u8);
        let Some(operand) = line.operand else {
            continue;
        };
        match line.op.operand() {
            Operand::None => {}
            Operand::U8 => {
                let value = parse_int(operand)?;
                if !(0..=255).contains(&value) {
                    return Err(AssembleError::new(
                        AssembleErrorKind::OperandOutOfRange { op: line.op, value },
                        operand,
                    ));
                }
                code.push(value as u8);
            }
            Operand::I32 => {
                let value = if line.op.takes_address() && is_label(operand.text) {
                    match labels.get(operand.text) {
                        Some(addr) => *addr as i64,
                        None => {
                            return Err(AssembleError::new(
                                AssembleErrorKind::UndefinedLabel(operand.text.to_string()),
                                operand,
                            ));
                        }
                    }
                } else {
                    parse_int(operand)?
                };
                let Ok(value) = i32::try_from(value) else {
                    return Err(AssembleError::new(
                        AssembleErrorKind::OperandOutOfRange { op: line.op, value },
                        operand,
                    ));
                };
                code.extend_from_slice(&value.to_le_bytes());
            }
        }
    }

    Program::from_bytes(code).map_err(|err| match err {
        ProgramError::TooLarge(len) => AssembleError {
            kind: AssembleErrorKind::ProgramTooLarge(len),
            span: 0..0,
            lineno: 1,
        },
        ProgramError::Read(_) | ProgramError::Write(_) => unreachable!("no io while assembling"),
    })
}

fn tokenize(source: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut line_start = 0;
    for (lineno, line) in source.split_inclusive('\n').enumerate() {
        let code = match line.find([';', '#']) {
            Some(i) => &line[..i],
            None => line,
        };
        let mut rest = code;
        let mut base = line_start;
        while let Some(start) = rest.find(|c: char| !c.is_whitespace()) {
            let after = &rest[start..];
            let len = after.find(char::is_whitespace).unwrap_or(after.len());
            tokens.push(Token {
                text: &after[..len],
                span: (base + start, base + start + len),
                lineno: lineno + 1,
            });
            base += start + len;
            rest = &after[len..];
        }
        line_start += line.len();
    }
    tokens
}

fn is_label(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_int(token: Token) -> Result<i64, AssembleError> {
    let text = token.text;
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let digits = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .map_or((digits, 10), |hex| (hex, 16));
    // from_str_radix takes its own sign, which would allow `--5` or `-0x-5`
    let parsed = match digits {
        (d, _) if d.starts_with(['+', '-']) => None,
        (d, radix) => i64::from_str_radix(d, radix).ok(),
    };
    let value = match parsed {
        Some(n) if negative => n.checked_neg(),
        n => n,
    };
    value.ok_or_else(|| {
        AssembleError::new(AssembleErrorKind::InvalidOperand(text.to_string()), token)
    })
}

/// Renders bytecode one instruction per line, prefixed with its offset.
pub fn disassemble(code: &[u8]) -> String {
    let s = &mut String::new();
    let mut pc = 0;
    while pc < code.len() {
        let byte = code[pc];
        let Some(op) = Opcode::from_repr(byte) else {
            swrite!(s, "{pc:04}  .byte 0x{byte:02x}\n");
            pc += 1;
            continue;
        };
        let operand = &code[pc + 1..code.len().min(pc + op.width())];
        match op.operand() {
            Operand::None => swrite!(s, "{pc:04}  {op}\n"),
            _ if operand.len() < op.operand().size() => {
                swrite!(s, "{pc:04}  {op} <truncated>\n")
            }
            Operand::U8 => swrite!(s, "{pc:04}  {op} {}\n", operand[0]),
            Operand::I32 => {
                let n = i32::from_le_bytes([operand[0], operand[1], operand[2], operand[3]]);
                swrite!(s, "{pc:04}  {op} {n}\n")
            }
        }
        pc += op.width();
    }
    std::mem::take(s)
}

impl AssembleError {
    fn new(kind: AssembleErrorKind, token: Token) -> Self {
        Self {
            kind,
            span: token.range(),
            lineno: token.lineno,
        }
    }

    pub fn kind(&self) -> &AssembleErrorKind {
        &self.kind
    }

    pub fn lineno(&self) -> usize {
        self.lineno
    }

    fn make_diagnostic(&self) -> Diagnostic<()> {
        Diagnostic::error()
            .with_message(self.kind.to_string())
            .with_labels(vec![Label::primary((), self.span.clone())])
    }

    pub fn emit(&self, filename: &str, source: &str) {
        let file = SimpleFile::new(filename, source);
        let writer = StandardStream::stderr(ColorChoice::Auto);
        let config = term::Config::default();

        if term::emit_to_write_style(&mut writer.lock(), &config, &file, &self.make_diagnostic())
            .is_err()
        {
            eprintln!("{self}");
        }
    }

    pub fn render(&self, filename: &str, source: &str) -> String {
        let file = SimpleFile::new(filename, source);
        let mut buffer = Buffer::no_color();
        let config = term::Config::default();

        match term::emit_to_write_style(&mut buffer, &config, &file, &self.make_diagnostic()) {
            Ok(()) => String::from_utf8_lossy(buffer.as_slice()).into_owned(),
            Err(_) => self.to_string(),
        }
    }
}

impl Error for AssembleError {}

impl Display for AssembleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.lineno, self.kind)
    }
}

impl Display for AssembleErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AssembleErrorKind::UnknownInstruction(s) => write!(f, "unknown instruction: {s}"),
            AssembleErrorKind::MissingOperand(op) => write!(f, "{op} expects an operand"),
            AssembleErrorKind::InvalidOperand(s) => write!(f, "invalid operand: {s}"),
            AssembleErrorKind::OperandOutOfRange { op, value } => match op.operand() {
                Operand::U8 => write!(f, "{op} operand out of range (0-255): {value}"),
                _ => write!(f, "{op} operand out of range: {value}"),
            },
            AssembleErrorKind::UndefinedLabel(s) => write!(f, "undefined label: {s}"),
            AssembleErrorKind::DuplicateLabel(s) => write!(f, "label declared more than once: {s}"),
            AssembleErrorKind::ProgramTooLarge(len) => {
                write!(f, "program is {len} bytes, the limit is {CODE_SIZE}")
            }
        }
    }
}
