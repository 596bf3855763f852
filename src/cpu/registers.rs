//! MIPS register file.
//!
//! 32 general-purpose 32-bit registers. Register 0 (`$zero`) is hardwired
//! to zero: it always reads 0 and writes to it are silently discarded.
//! Register 31 (`$ra`) is the link register used by JAL.

use serde::{Deserialize, Serialize};

/// Number of general-purpose registers.
pub const REG_COUNT: usize = 32;

/// The hardwired zero register.
pub const ZERO: u8 = 0;

/// The return-address (link) register, written by JAL.
pub const RA: u8 = 31;

/// Conventional MIPS register names, indexed by register number.
/// Shared by the assembler (name → index) and disassembler (index → name).
pub const REG_NAMES: [&str; REG_COUNT] = [
    "zero", "at", "v0", "v1", "a0", "a1", "a2", "a3",
    "t0", "t1", "t2", "t3", "t4", "t5", "t6", "t7",
    "s0", "s1", "s2", "s3", "s4", "s5", "s6", "s7",
    "t8", "t9", "k0", "k1", "gp", "sp", "fp", "ra",
];

/// Look up a register number by its conventional name (without the `$`).
pub fn lookup_name(name: &str) -> Option<u8> {
    REG_NAMES
        .iter()
        .position(|&n| n == name)
        .map(|i| i as u8)
}

/// The register file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    regs: [i32; REG_COUNT],
}

impl Registers {
    /// Create a register file with all slots zeroed.
    pub fn new() -> Self {
        Self {
            regs: [0; REG_COUNT],
        }
    }

    /// Reset all registers to zero.
    pub fn reset(&mut self) {
        self.regs = [0; REG_COUNT];
    }

    /// Read a register.
    ///
    /// The index must already be validated by the CPU's decode step
    /// (`idx < REG_COUNT`).
    #[inline]
    pub fn get(&self, idx: u8) -> i32 {
        debug_assert!((idx as usize) < REG_COUNT);
        self.regs[idx as usize]
    }

    /// Write a register. Writes to `$zero` are discarded.
    #[inline]
    pub fn set(&mut self, idx: u8, value: i32) {
        debug_assert!((idx as usize) < REG_COUNT);
        if idx != ZERO {
            self.regs[idx as usize] = value;
        }
    }

    /// Raw view of all 32 registers, for snapshots.
    pub fn as_slice(&self) -> &[i32; REG_COUNT] {
        &self.regs
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}
