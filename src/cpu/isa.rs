//! Instruction set for the MIPS-like CPU.
//!
//! Instructions are a closed tagged enum, so opcode dispatch is checked
//! for exhaustiveness at compile time. Records are immutable once parsed;
//! the assembler has already resolved labels, so branch and jump targets
//! here are absolute instruction indices (the PC counts instructions, not
//! bytes).

use serde::{Deserialize, Serialize};

use crate::cpu::registers::REG_COUNT;

/// CACHE operand code: disable the cache.
pub const CACHE_OFF: u8 = 0;
/// CACHE operand code: enable the cache.
pub const CACHE_ON: u8 = 1;
/// CACHE operand code: flush (invalidate) all entries.
pub const CACHE_FLUSH: u8 = 2;

/// Three-register arithmetic operations (R-type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AluOp {
    /// `rd = rs + rt` (wrapping).
    Add,
    /// `rd = rs - rt` (wrapping).
    Sub,
    /// `rd = 1 if rs < rt else 0` (signed comparison).
    Slt,
}

impl AluOp {
    /// Apply the operation to two register values.
    pub fn apply(self, rs: i32, rt: i32) -> i32 {
        match self {
            AluOp::Add => rs.wrapping_add(rt),
            AluOp::Sub => rs.wrapping_sub(rt),
            AluOp::Slt => i32::from(rs < rt),
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            AluOp::Add => "ADD",
            AluOp::Sub => "SUB",
            AluOp::Slt => "SLT",
        }
    }
}

/// Immediate operations (I-type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImmOp {
    /// `rt = rs + imm` (imm sign-extended by the assembler, wrapping add).
    Addi,
    /// Branch to the target index if `rs == rt`.
    Beq,
    /// Branch to the target index if `rs != rt`.
    Bne,
}

impl ImmOp {
    /// Whether this operation is a conditional branch.
    pub fn is_branch(self) -> bool {
        !matches!(self, ImmOp::Addi)
    }

    /// Branch condition on two register values. ADDI never branches.
    pub fn taken(self, rs: i32, rt: i32) -> bool {
        match self {
            ImmOp::Addi => false,
            ImmOp::Beq => rs == rt,
            ImmOp::Bne => rs != rt,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            ImmOp::Addi => "ADDI",
            ImmOp::Beq => "BEQ",
            ImmOp::Bne => "BNE",
        }
    }
}

/// Unconditional jumps (J-type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JumpOp {
    /// `PC = target`.
    J,
    /// `$ra = PC + 1; PC = target`.
    Jal,
}

impl JumpOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            JumpOp::J => "J",
            JumpOp::Jal => "JAL",
        }
    }
}

/// Memory access operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemOp {
    /// `rt = memory[base + offset]`, through the cache.
    Lw,
    /// `memory[base + offset] = rt`, through the cache.
    Sw,
}

impl MemOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            MemOp::Lw => "LW",
            MemOp::Sw => "SW",
        }
    }
}

/// A decoded instruction record.
///
/// Only the fields relevant to each variant are carried. For branches the
/// `imm` field holds the resolved target instruction index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// `op rd, rs, rt`
    RType { op: AluOp, rd: u8, rs: u8, rt: u8 },
    /// `ADDI rt, rs, imm` or `BEQ/BNE rs, rt, target`
    IType { op: ImmOp, rt: u8, rs: u8, imm: i32 },
    /// `J target` / `JAL target`
    JType { op: JumpOp, target: u32 },
    /// `LW rt, offset(base)` / `SW rt, offset(base)`
    Mem {
        op: MemOp,
        rt: u8,
        base: u8,
        offset: i32,
    },
    /// `CACHE code` — see [`CACHE_OFF`], [`CACHE_ON`], [`CACHE_FLUSH`].
    CacheCtl { code: u8 },
    /// `HALT`
    Halt,
}

impl Instruction {
    /// Register operands referenced by this instruction, for the CPU's
    /// decode-time range validation.
    pub fn registers(&self) -> Vec<u8> {
        match *self {
            Instruction::RType { rd, rs, rt, .. } => vec![rd, rs, rt],
            Instruction::IType { rt, rs, .. } => vec![rt, rs],
            Instruction::Mem { rt, base, .. } => vec![rt, base],
            Instruction::JType { .. } | Instruction::CacheCtl { .. } | Instruction::Halt => {
                Vec::new()
            }
        }
    }

    /// The register operand that is out of range, if any.
    pub fn invalid_register(&self) -> Option<u8> {
        self.registers()
            .into_iter()
            .find(|&r| usize::from(r) >= REG_COUNT)
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::RType { op, .. } => op.mnemonic(),
            Instruction::IType { op, .. } => op.mnemonic(),
            Instruction::JType { op, .. } => op.mnemonic(),
            Instruction::Mem { op, .. } => op.mnemonic(),
            Instruction::CacheCtl { .. } => "CACHE",
            Instruction::Halt => "HALT",
        }
    }
}

/// Effective address of a load/store: base register value plus offset,
/// wrapping modulo 2^32 and reinterpreted as an unsigned bus address.
pub fn effective_address(base: i32, offset: i32) -> u32 {
    base.wrapping_add(offset) as u32
}
