//! The simulated machine: memory bus, cache, registers, instruction set,
//! and the fetch-decode-execute engine.

pub mod bus;
pub mod cache;
pub mod execute;
pub mod isa;
pub mod registers;

pub use bus::{BusError, BusStats, MemoryBus};
pub use cache::{Cache, CacheStats};
pub use execute::{Cpu, CpuError, CpuState, Snapshot, DEFAULT_STEP_LIMIT};
pub use isa::{AluOp, ImmOp, Instruction, JumpOp, MemOp};
pub use registers::{Registers, REG_COUNT, REG_NAMES};
