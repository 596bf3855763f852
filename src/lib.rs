//! # mipsim
//!
//! An instruction-level simulator for a small MIPS-like CPU, built for
//! educational exploration of CPU architecture concepts: register/PC
//! state, branch/jump control flow, and the behavior of a toggleable
//! single-level write-through cache in front of a flat memory bus.
//!
//! The PC counts instructions (not bytes); memory addresses are byte-based
//! with 4-byte-aligned 32-bit words. Programs control the cache with the
//! CACHE instruction (0 = off, 1 = on, 2 = flush).

pub mod asm;
pub mod cpu;

// Re-export commonly used types
pub use asm::{assemble, disassemble, parse_memory_init, AssemblerError};
pub use cpu::{
    Cache, CacheStats, Cpu, CpuError, CpuState, Instruction, MemoryBus, Registers, Snapshot,
};
