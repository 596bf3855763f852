//! Disassembler: instruction records back to canonical source text.
//!
//! Used by the CLI for `--trace` output and the `disasm` subcommand.

use crate::cpu::isa::Instruction;
use crate::cpu::registers::REG_NAMES;

/// Conventional `$name` form of a register index.
fn reg(idx: u8) -> String {
    match REG_NAMES.get(idx as usize) {
        Some(name) => format!("${name}"),
        None => format!("${idx}"),
    }
}

/// Format a single instruction in canonical syntax.
pub fn format_instruction(instr: &Instruction) -> String {
    match *instr {
        Instruction::RType { op, rd, rs, rt } => {
            format!("{} {}, {}, {}", op.mnemonic(), reg(rd), reg(rs), reg(rt))
        }
        Instruction::IType { op, rt, rs, imm } => {
            if op.is_branch() {
                format!("{} {}, {}, {}", op.mnemonic(), reg(rs), reg(rt), imm)
            } else {
                format!("{} {}, {}, {}", op.mnemonic(), reg(rt), reg(rs), imm)
            }
        }
        Instruction::JType { op, target } => format!("{} {}", op.mnemonic(), target),
        Instruction::Mem {
            op,
            rt,
            base,
            offset,
        } => format!("{} {}, {}({})", op.mnemonic(), reg(rt), offset, reg(base)),
        Instruction::CacheCtl { code } => format!("CACHE {code}"),
        Instruction::Halt => "HALT".to_string(),
    }
}

/// Disassemble a whole program, one indexed line per instruction.
pub fn disassemble(program: &[Instruction]) -> String {
    program
        .iter()
        .enumerate()
        .map(|(i, instr)| format!("{i:4}: {}", format_instruction(instr)))
        .collect::<Vec<_>>()
        .join("\n")
}
