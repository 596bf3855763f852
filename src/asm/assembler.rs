//! Two-pass assembler for MIPS-like programs.
//!
//! Syntax:
//! ```text
//! # Comment
//! loop:                   # define a label
//!     ADDI $t0, $zero, 4  # immediate arithmetic
//!     LW   $t1, 0($t0)    # load word
//!     BEQ  $t0, $t1, loop # branch to label
//!     CACHE 1             # cache control (0 off, 1 on, 2 flush)
//!     HALT
//! ```
//!
//! Pass 1 collects labels; pass 2 emits instruction records with branch
//! and jump targets resolved to absolute instruction indices. The core
//! never sees label text.

use std::collections::HashMap;

use thiserror::Error;

use crate::cpu::isa::{AluOp, ImmOp, Instruction, JumpOp, MemOp};
use crate::cpu::registers::lookup_name;

/// Assemble source text into instruction records.
pub fn assemble(source: &str) -> Result<Vec<Instruction>, AssemblerError> {
    let mut asm = Assembler::new();
    asm.collect_labels(source);
    asm.emit(source)
}

/// Parse a memory-initialization file: one `address: value` pair per line,
/// `#` comments. Alignment is enforced later by `MemoryBus::load`.
pub fn parse_memory_init(source: &str) -> Result<Vec<(u32, i32)>, AssemblerError> {
    let mut init = Vec::new();

    for (idx, raw) in source.lines().enumerate() {
        let line_num = idx + 1;
        let Some(line) = strip_comment(raw) else {
            continue;
        };

        let Some((addr_str, value_str)) = line.split_once(':') else {
            return Err(AssemblerError::SyntaxError {
                line: line_num,
                message: format!("expected `address: value`, found `{line}`"),
            });
        };

        let addr = parse_number(addr_str.trim()).ok_or_else(|| AssemblerError::SyntaxError {
            line: line_num,
            message: format!("invalid address `{}`", addr_str.trim()),
        })?;
        if !(0..=i64::from(u32::MAX)).contains(&addr) {
            return Err(AssemblerError::SyntaxError {
                line: line_num,
                message: format!("address {addr} outside the 32-bit space"),
            });
        }

        let value = parse_number(value_str.trim()).ok_or_else(|| AssemblerError::SyntaxError {
            line: line_num,
            message: format!("invalid value `{}`", value_str.trim()),
        })?;
        if !(i64::from(i32::MIN)..=i64::from(u32::MAX)).contains(&value) {
            return Err(AssemblerError::SyntaxError {
                line: line_num,
                message: format!("value {value} does not fit in a 32-bit word"),
            });
        }

        init.push((addr as u32, value as i32));
    }

    Ok(init)
}

/// The assembler state.
struct Assembler {
    /// Label table: name → absolute instruction index.
    symbols: HashMap<String, u32>,
}

impl Assembler {
    fn new() -> Self {
        Self {
            symbols: HashMap::new(),
        }
    }

    /// Pass 1: record each label's instruction index.
    fn collect_labels(&mut self, source: &str) {
        let mut index = 0u32;
        for raw in source.lines() {
            let Some(line) = strip_comment(raw) else {
                continue;
            };
            let (label, rest) = split_label(line);
            if let Some(label) = label {
                self.symbols.insert(label.to_string(), index);
            }
            if !rest.is_empty() {
                index += 1;
            }
        }
    }

    /// Pass 2: emit instruction records.
    fn emit(&self, source: &str) -> Result<Vec<Instruction>, AssemblerError> {
        let mut program = Vec::new();
        for (idx, raw) in source.lines().enumerate() {
            let Some(line) = strip_comment(raw) else {
                continue;
            };
            let (_, rest) = split_label(line);
            if rest.is_empty() {
                continue;
            }
            program.push(self.parse_instruction(rest, idx + 1)?);
        }
        Ok(program)
    }

    fn parse_instruction(&self, text: &str, line: usize) -> Result<Instruction, AssemblerError> {
        // Commas are operand separators, interchangeable with spaces.
        let cleaned = text.replace(',', " ");
        let parts: Vec<&str> = cleaned.split_whitespace().collect();
        let Some((&first, operands)) = parts.split_first() else {
            // e.g. a line holding nothing but separators
            return Err(AssemblerError::SyntaxError {
                line,
                message: format!("expected an instruction, found `{text}`"),
            });
        };
        let mnemonic = first.to_uppercase();

        let expect = |n: usize| -> Result<(), AssemblerError> {
            if operands.len() == n {
                Ok(())
            } else {
                Err(AssemblerError::OperandCountMismatch {
                    line,
                    mnemonic: mnemonic.clone(),
                    expected: n,
                    found: operands.len(),
                })
            }
        };

        let instr = match mnemonic.as_str() {
            "ADD" | "SUB" | "SLT" => {
                expect(3)?;
                let op = match mnemonic.as_str() {
                    "ADD" => AluOp::Add,
                    "SUB" => AluOp::Sub,
                    _ => AluOp::Slt,
                };
                Instruction::RType {
                    op,
                    rd: parse_register(operands[0], line)?,
                    rs: parse_register(operands[1], line)?,
                    rt: parse_register(operands[2], line)?,
                }
            }

            "ADDI" => {
                expect(3)?;
                Instruction::IType {
                    op: ImmOp::Addi,
                    rt: parse_register(operands[0], line)?,
                    rs: parse_register(operands[1], line)?,
                    imm: parse_immediate(operands[2], line)?,
                }
            }

            "BEQ" | "BNE" => {
                expect(3)?;
                let op = if mnemonic == "BEQ" { ImmOp::Beq } else { ImmOp::Bne };
                Instruction::IType {
                    op,
                    rs: parse_register(operands[0], line)?,
                    rt: parse_register(operands[1], line)?,
                    imm: self.resolve_target(operands[2], line)? as i32,
                }
            }

            "J" | "JAL" => {
                expect(1)?;
                let op = if mnemonic == "J" { JumpOp::J } else { JumpOp::Jal };
                Instruction::JType {
                    op,
                    target: self.resolve_target(operands[0], line)?,
                }
            }

            "LW" | "SW" => {
                expect(2)?;
                let op = if mnemonic == "LW" { MemOp::Lw } else { MemOp::Sw };
                let (offset, base) = parse_offset_base(operands[1], line)?;
                Instruction::Mem {
                    op,
                    rt: parse_register(operands[0], line)?,
                    base,
                    offset,
                }
            }

            "CACHE" => {
                expect(1)?;
                let code = parse_number(operands[0])
                    .filter(|c| (0..=255).contains(c))
                    .ok_or_else(|| AssemblerError::SyntaxError {
                        line,
                        message: format!("invalid cache code `{}`", operands[0]),
                    })?;
                Instruction::CacheCtl { code: code as u8 }
            }

            "HALT" => {
                expect(0)?;
                Instruction::Halt
            }

            _ => {
                return Err(AssemblerError::UnknownOpcode {
                    line,
                    mnemonic: first.to_string(),
                })
            }
        };

        Ok(instr)
    }

    /// Resolve a branch/jump target: a label or a bare instruction index.
    fn resolve_target(&self, token: &str, line: usize) -> Result<u32, AssemblerError> {
        if let Some(value) = parse_number(token) {
            if (0..=i64::from(u32::MAX)).contains(&value) {
                return Ok(value as u32);
            }
            return Err(AssemblerError::SyntaxError {
                line,
                message: format!("jump target {value} out of range"),
            });
        }

        self.symbols
            .get(token)
            .copied()
            .ok_or_else(|| AssemblerError::UndefinedLabel {
                line,
                label: token.to_string(),
            })
    }
}

/// Strip a `#` comment and surrounding whitespace.
/// Returns `None` for lines with no content.
fn strip_comment(raw: &str) -> Option<&str> {
    let line = match raw.find('#') {
        Some(idx) => &raw[..idx],
        None => raw,
    };
    let line = line.trim();
    if line.is_empty() {
        None
    } else {
        Some(line)
    }
}

/// Split an optional leading `label:` from the rest of the line.
fn split_label(line: &str) -> (Option<&str>, &str) {
    match line.split_once(':') {
        Some((label, rest)) => (Some(label.trim()), rest.trim()),
        None => (None, line),
    }
}

/// Parse `$name` or `$number` into a register index.
fn parse_register(token: &str, line: usize) -> Result<u8, AssemblerError> {
    let invalid = || AssemblerError::InvalidRegister {
        line,
        register: token.to_string(),
    };

    let name = token.strip_prefix('$').ok_or_else(invalid)?;
    if let Some(idx) = lookup_name(name) {
        return Ok(idx);
    }
    match name.parse::<u8>() {
        Ok(idx) if idx < 32 => Ok(idx),
        _ => Err(invalid()),
    }
}

/// Parse a 16-bit signed immediate (stored sign-extended).
fn parse_immediate(token: &str, line: usize) -> Result<i32, AssemblerError> {
    let value = parse_number(token).ok_or_else(|| AssemblerError::SyntaxError {
        line,
        message: format!("invalid immediate `{token}`"),
    })?;
    if !(-32768..=32767).contains(&value) {
        return Err(AssemblerError::ImmediateOutOfRange { line, value });
    }
    Ok(value as i32)
}

/// Parse the `offset($base)` form of LW/SW operands.
fn parse_offset_base(token: &str, line: usize) -> Result<(i32, u8), AssemblerError> {
    let (offset_str, rest) = token.split_once('(').ok_or_else(|| {
        AssemblerError::SyntaxError {
            line,
            message: format!("expected `offset($base)`, found `{token}`"),
        }
    })?;
    let base_str = rest
        .strip_suffix(')')
        .ok_or_else(|| AssemblerError::SyntaxError {
            line,
            message: format!("unclosed `(` in `{token}`"),
        })?;

    let offset = parse_immediate(offset_str.trim(), line)?;
    let base = parse_register(base_str.trim(), line)?;
    Ok((offset, base))
}

/// Parse a decimal, hex (`0x`), or binary (`0b`) number with optional sign.
fn parse_number(token: &str) -> Option<i64> {
    let token = token.trim();
    let (negative, digits) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };

    let magnitude = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else if let Some(bin) = digits.strip_prefix("0b").or_else(|| digits.strip_prefix("0B")) {
        i64::from_str_radix(bin, 2).ok()?
    } else {
        digits.parse::<i64>().ok()?
    };

    Some(if negative { -magnitude } else { magnitude })
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("unknown opcode on line {line}: {mnemonic}")]
    UnknownOpcode { line: usize, mnemonic: String },

    #[error("operand count mismatch on line {line}: {mnemonic} takes {expected} operand(s), found {found}")]
    OperandCountMismatch {
        line: usize,
        mnemonic: String,
        expected: usize,
        found: usize,
    },

    #[error("invalid register on line {line}: {register}")]
    InvalidRegister { line: usize, register: String },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("immediate out of range on line {line}: {value} (signed 16-bit)")]
    ImmediateOutOfRange { line: usize, value: i64 },

    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_simple() {
        let source = r#"
            # add two immediates
            ADDI $t0, $zero, 3
            ADDI $t1, $zero, 4
            ADD  $t2, $t0, $t1
            HALT
        "#;
        let program = assemble(source).unwrap();
        assert_eq!(program.len(), 4);
        assert_eq!(
            program[2],
            Instruction::RType {
                op: AluOp::Add,
                rd: 10,
                rs: 8,
                rt: 9,
            }
        );
        assert_eq!(program[3], Instruction::Halt);
    }

    #[test]
    fn test_labels_resolve_to_indices() {
        let source = r#"
        start:
            BEQ $t0, $t1, end   # forward reference
            J start
        end:
            HALT
        "#;
        let program = assemble(source).unwrap();
        assert_eq!(
            program[0],
            Instruction::IType {
                op: ImmOp::Beq,
                rs: 8,
                rt: 9,
                imm: 2,
            }
        );
        assert_eq!(
            program[1],
            Instruction::JType {
                op: JumpOp::J,
                target: 0,
            }
        );
    }

    #[test]
    fn test_label_on_same_line_as_instruction() {
        let program = assemble("loop: J loop").unwrap();
        assert_eq!(
            program[0],
            Instruction::JType {
                op: JumpOp::J,
                target: 0,
            }
        );
    }

    #[test]
    fn test_memory_access_syntax() {
        let program = assemble("LW $t0, 0x100($zero)\nSW $t0, -4($sp)\nHALT").unwrap();
        assert_eq!(
            program[0],
            Instruction::Mem {
                op: MemOp::Lw,
                rt: 8,
                base: 0,
                offset: 0x100,
            }
        );
        assert_eq!(
            program[1],
            Instruction::Mem {
                op: MemOp::Sw,
                rt: 8,
                base: 29,
                offset: -4,
            }
        );
    }

    #[test]
    fn test_cache_and_numeric_registers() {
        let program = assemble("CACHE 1\nADD $1, $2, $3").unwrap();
        assert_eq!(program[0], Instruction::CacheCtl { code: 1 });
        assert_eq!(
            program[1],
            Instruction::RType {
                op: AluOp::Add,
                rd: 1,
                rs: 2,
                rt: 3,
            }
        );
    }

    #[test]
    fn test_unknown_opcode() {
        let err = assemble("FROB $t0, $t1, $t2").unwrap_err();
        assert_eq!(
            err,
            AssemblerError::UnknownOpcode {
                line: 1,
                mnemonic: "FROB".to_string(),
            }
        );
    }

    #[test]
    fn test_separator_only_line_is_a_syntax_error() {
        // A bare `,` survives comment stripping but holds no tokens.
        let err = assemble("ADDI $t0, $zero, 1\n,\nHALT").unwrap_err();
        assert!(matches!(err, AssemblerError::SyntaxError { line: 2, .. }));
    }

    #[test]
    fn test_operand_count_mismatch() {
        let err = assemble("ADD $t0, $t1").unwrap_err();
        assert_eq!(
            err,
            AssemblerError::OperandCountMismatch {
                line: 1,
                mnemonic: "ADD".to_string(),
                expected: 3,
                found: 2,
            }
        );
    }

    #[test]
    fn test_invalid_register() {
        let err = assemble("ADD $t0, $t1, $frob").unwrap_err();
        assert!(matches!(err, AssemblerError::InvalidRegister { line: 1, .. }));

        let err = assemble("ADD $t0, $t1, $32").unwrap_err();
        assert!(matches!(err, AssemblerError::InvalidRegister { line: 1, .. }));
    }

    #[test]
    fn test_undefined_label() {
        let err = assemble("J nowhere").unwrap_err();
        assert_eq!(
            err,
            AssemblerError::UndefinedLabel {
                line: 1,
                label: "nowhere".to_string(),
            }
        );
    }

    #[test]
    fn test_immediate_range() {
        assert!(assemble("ADDI $t0, $zero, 32767").is_ok());
        assert!(assemble("ADDI $t0, $zero, -32768").is_ok());
        let err = assemble("ADDI $t0, $zero, 40000").unwrap_err();
        assert_eq!(
            err,
            AssemblerError::ImmediateOutOfRange {
                line: 1,
                value: 40000,
            }
        );
    }

    #[test]
    fn test_mnemonics_case_insensitive() {
        let program = assemble("addi $t0, $zero, 1\nhalt").unwrap();
        assert_eq!(program.len(), 2);
        assert_eq!(program[1], Instruction::Halt);
    }

    #[test]
    fn test_parse_memory_init() {
        let source = r#"
            # word-aligned init data
            0x100: 5
            0x104: 0x0A
            0x108: -15
        "#;
        let init = parse_memory_init(source).unwrap();
        assert_eq!(init, vec![(0x100, 5), (0x104, 10), (0x108, -15)]);
    }

    #[test]
    fn test_parse_memory_init_rejects_garbage() {
        let err = parse_memory_init("0x100 5").unwrap_err();
        assert!(matches!(err, AssemblerError::SyntaxError { line: 1, .. }));
    }
}
