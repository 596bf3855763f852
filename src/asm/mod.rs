//! Text surface for the simulator.
//!
//! This module provides:
//! - A simple two-pass assembler (text → instruction records)
//! - A memory-initialization file parser
//! - A disassembler (records → canonical text)

pub mod assembler;
pub mod disasm;

pub use assembler::{assemble, parse_memory_init, AssemblerError};
pub use disasm::{disassemble, format_instruction};
