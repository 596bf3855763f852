//! CPU execution engine.
//!
//! Implements the fetch-decode-execute cycle over already-parsed
//! instruction records. The PC is an index into the instruction sequence
//! (instruction-count units); fetching past the end is a normal halt, not
//! an error. Loads and stores go through the cache, which passes through
//! to the bus while disabled.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cpu::bus::{BusError, BusStats, MemoryBus};
use crate::cpu::cache::{Cache, CacheStats};
use crate::cpu::isa::{
    self, Instruction, JumpOp, MemOp, CACHE_FLUSH, CACHE_OFF, CACHE_ON,
};
use crate::cpu::registers::{Registers, RA, REG_COUNT};

/// Default bound on executed instructions per run, guarding against
/// infinite loops in malformed programs.
pub const DEFAULT_STEP_LIMIT: u64 = 100_000;

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// Program loaded, nothing executed yet.
    Ready,
    /// Mid-run.
    Running,
    /// Normal termination: HALT, or the PC ran off the end of the program.
    Halted,
    /// A step failed; see [`Cpu::fault`] for the cause.
    Faulted,
}

/// The MIPS-like CPU.
///
/// Owns its register file, cache, and memory bus outright, so several
/// independent simulated runs can coexist in one process.
#[derive(Clone, Debug)]
pub struct Cpu {
    /// Register file.
    pub regs: Registers,
    /// Memory bus (backing store).
    pub bus: MemoryBus,
    /// Cache layer in front of the bus.
    pub cache: Cache,
    program: Vec<Instruction>,
    pc: u32,
    state: CpuState,
    steps: u64,
    step_limit: u64,
    last_instr: Option<Instruction>,
    last_load_hit: Option<bool>,
    fault: Option<CpuError>,
}

impl Cpu {
    /// Create a CPU with an empty program, an unbounded bus, and the
    /// default step limit.
    pub fn new() -> Self {
        Self::with_step_limit(DEFAULT_STEP_LIMIT)
    }

    /// Create a CPU with a custom step limit.
    pub fn with_step_limit(step_limit: u64) -> Self {
        Self {
            regs: Registers::new(),
            bus: MemoryBus::new(),
            cache: Cache::new(),
            program: Vec::new(),
            pc: 0,
            state: CpuState::Ready,
            steps: 0,
            step_limit,
            last_instr: None,
            last_load_hit: None,
            fault: None,
        }
    }

    /// Load a program, resetting the PC and execution state.
    pub fn load_program(&mut self, program: Vec<Instruction>) {
        self.program = program;
        self.pc = 0;
        self.state = CpuState::Ready;
        self.last_instr = None;
        self.last_load_hit = None;
        self.fault = None;
    }

    /// Populate initial memory contents through the bus.
    pub fn load_memory(&mut self, init: &[(u32, i32)]) -> Result<(), BusError> {
        self.bus.load(init)
    }

    /// Reset registers, PC, step counter, cache, and memory contents.
    /// The loaded program is kept.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.bus.clear();
        self.cache = Cache::new();
        self.pc = 0;
        self.state = CpuState::Ready;
        self.steps = 0;
        self.last_instr = None;
        self.last_load_hit = None;
        self.fault = None;
    }

    /// Execute a single fetch-decode-execute cycle.
    ///
    /// Returns the executed instruction, or `None` when the PC has run off
    /// the end of the program (a normal halt). Errors transition the CPU
    /// to [`CpuState::Faulted`] with the cause retained.
    pub fn step(&mut self) -> Result<Option<Instruction>, CpuError> {
        match self.state {
            CpuState::Ready => self.state = CpuState::Running,
            CpuState::Running => {}
            state => return Err(CpuError::NotRunning(state)),
        }

        // Fetch. An out-of-range PC ends execution normally.
        let Some(&instr) = self.program.get(self.pc as usize) else {
            self.state = CpuState::Halted;
            return Ok(None);
        };

        // The limit bounds executed instructions; a run that finishes in
        // exactly `step_limit` steps is fine, attempting one more is not.
        if self.steps >= self.step_limit {
            return Err(self.fault_with(CpuError::StepLimitExceeded(self.step_limit), instr));
        }

        // Decode-time validation: operand register indices must be in range.
        if let Some(reg) = instr.invalid_register() {
            return Err(self.fault_with(CpuError::RegisterOutOfRange(reg), instr));
        }

        // Execute.
        if let Err(err) = self.exec(instr) {
            return Err(self.fault_with(err, instr));
        }

        self.steps += 1;
        self.last_instr = Some(instr);

        Ok(Some(instr))
    }

    /// Run until the CPU leaves the running state.
    ///
    /// Returns the number of instructions executed by this call.
    pub fn run(&mut self) -> Result<u64, CpuError> {
        let start = self.steps;
        while matches!(self.state, CpuState::Ready | CpuState::Running) {
            if self.step()?.is_none() {
                break;
            }
        }
        Ok(self.steps - start)
    }

    fn exec(&mut self, instr: Instruction) -> Result<(), CpuError> {
        self.last_load_hit = None;

        match instr {
            Instruction::RType { op, rd, rs, rt } => {
                let value = op.apply(self.regs.get(rs), self.regs.get(rt));
                self.regs.set(rd, value);
                self.pc += 1;
            }

            Instruction::IType { op, rt, rs, imm } => {
                if op.is_branch() {
                    if op.taken(self.regs.get(rs), self.regs.get(rt)) {
                        self.pc = imm as u32;
                    } else {
                        self.pc += 1;
                    }
                } else {
                    let value = self.regs.get(rs).wrapping_add(imm);
                    self.regs.set(rt, value);
                    self.pc += 1;
                }
            }

            Instruction::JType { op, target } => {
                if op == JumpOp::Jal {
                    self.regs.set(RA, (self.pc + 1) as i32);
                }
                self.pc = target;
            }

            Instruction::Mem {
                op,
                rt,
                base,
                offset,
            } => {
                let addr = isa::effective_address(self.regs.get(base), offset);
                match op {
                    MemOp::Lw => {
                        let (word, hit) = self.cache.read(&mut self.bus, addr)?;
                        self.last_load_hit = self.cache.is_enabled().then_some(hit);
                        self.regs.set(rt, word);
                    }
                    MemOp::Sw => {
                        self.cache.write(&mut self.bus, addr, self.regs.get(rt))?;
                    }
                }
                self.pc += 1;
            }

            Instruction::CacheCtl { code } => {
                match code {
                    CACHE_OFF => self.cache.toggle(false),
                    CACHE_ON => self.cache.toggle(true),
                    CACHE_FLUSH => self.cache.flush(),
                    code => return Err(CpuError::InvalidCacheCode(code)),
                }
                self.pc += 1;
            }

            Instruction::Halt => {
                // PC stays on the HALT instruction; no further fetch.
                self.state = CpuState::Halted;
            }
        }

        Ok(())
    }

    fn fault_with(&mut self, err: CpuError, instr: Instruction) -> CpuError {
        self.state = CpuState::Faulted;
        self.last_instr = Some(instr);
        self.fault = Some(err.clone());
        err
    }

    /// Current execution state.
    pub fn state(&self) -> CpuState {
        self.state
    }

    /// Current program counter, in instruction-index units.
    pub fn pc(&self) -> u32 {
        self.pc
    }

    /// Total instructions executed.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// The error that faulted the CPU, if any.
    pub fn fault(&self) -> Option<&CpuError> {
        self.fault.as_ref()
    }

    /// The last executed (or faulting) instruction.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }

    /// The loaded program.
    pub fn program(&self) -> &[Instruction] {
        &self.program
    }

    /// Check if the CPU halted normally.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Check if the CPU can still step.
    pub fn is_running(&self) -> bool {
        matches!(self.state, CpuState::Ready | CpuState::Running)
    }

    /// Read-only view of the machine for external reporters.
    /// The core itself never formats or prints.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state,
            pc: self.pc,
            steps: self.steps,
            registers: *self.regs.as_slice(),
            last_instruction: self.last_instr,
            last_load_hit: self.last_load_hit,
            cache: self.cache.stats(),
            bus: self.bus.stats(),
            fault: self.fault.as_ref().map(|e| e.to_string()),
        }
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of CPU state after a step or run.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub state: CpuState,
    pub pc: u32,
    pub steps: u64,
    pub registers: [i32; REG_COUNT],
    pub last_instruction: Option<Instruction>,
    /// Hit flag of the last LW while the cache was enabled.
    pub last_load_hit: Option<bool>,
    pub cache: CacheStats,
    pub bus: BusStats,
    pub fault: Option<String>,
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("CPU is not running (state: {0:?})")]
    NotRunning(CpuState),

    #[error("bus error: {0}")]
    Bus(#[from] BusError),

    #[error("register index {0} out of range (0-31)")]
    RegisterOutOfRange(u8),

    #[error("invalid cache control code {0} (expected 0, 1, or 2)")]
    InvalidCacheCode(u8),

    #[error("step limit of {0} instructions exceeded")]
    StepLimitExceeded(u64),
}
