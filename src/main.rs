//! mipsim - CLI Entry Point
//!
//! Commands:
//! - `mipsim run <program>` - Assemble and run a program
//! - `mipsim disasm <program>` - Show the assembled instruction records

use clap::{Parser, Subcommand};

use mipsim::cpu::registers::REG_NAMES;
use mipsim::cpu::DEFAULT_STEP_LIMIT;
use mipsim::{assemble, disassemble, parse_memory_init, Cpu};

#[derive(Parser)]
#[command(name = "mipsim")]
#[command(version = "0.1.0")]
#[command(about = "An instruction-level simulator for a small MIPS-like CPU")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble a program and run it until it halts
    Run {
        /// Path to the assembly source file
        program: String,
        /// Memory initialization file (`address: value` lines)
        #[arg(short, long)]
        memory_init: Option<String>,
        /// Maximum number of instructions to execute
        #[arg(short = 's', long, default_value_t = DEFAULT_STEP_LIMIT)]
        max_steps: u64,
        /// Print each executed instruction
        #[arg(short, long)]
        trace: bool,
        /// Print the final snapshot as JSON
        #[arg(short, long)]
        json: bool,
    },
    /// Assemble a program and print its instruction records
    Disasm {
        /// Path to the assembly source file
        program: String,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            program,
            memory_init,
            max_steps,
            trace,
            json,
        } => run_program(&program, memory_init.as_deref(), max_steps, trace, json),
        Commands::Disasm { program } => disasm_program(&program),
    }
}

fn read_file(path: &str) -> String {
    match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("❌ Failed to read {}: {}", path, e);
            std::process::exit(1);
        }
    }
}

fn run_program(path: &str, memory_init: Option<&str>, max_steps: u64, trace: bool, json: bool) {
    let program = match assemble(&read_file(path)) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("❌ Assembly error: {}", e);
            std::process::exit(1);
        }
    };

    if !json {
        println!("🔧 Running: {} ({} instructions)", path, program.len());
    }

    let mut cpu = Cpu::with_step_limit(max_steps);

    if let Some(init_path) = memory_init {
        let init = match parse_memory_init(&read_file(init_path)) {
            Ok(data) => data,
            Err(e) => {
                eprintln!("❌ Memory init error: {}", e);
                std::process::exit(1);
            }
        };
        if let Err(e) = cpu.load_memory(&init) {
            eprintln!("❌ Memory init error: {}", e);
            std::process::exit(1);
        }
        if !json {
            println!("📂 Loaded {} memory words from {}", init.len(), init_path);
        }
    }

    cpu.load_program(program);

    let result = loop {
        match cpu.step() {
            Ok(Some(instr)) => {
                if trace {
                    let hit = match cpu.snapshot().last_load_hit {
                        Some(true) => "  [cache hit]",
                        Some(false) => "  [cache miss]",
                        None => "",
                    };
                    println!(
                        "{:4}: {}{}",
                        cpu.snapshot().steps - 1,
                        mipsim::asm::format_instruction(&instr),
                        hit
                    );
                }
                if !cpu.is_running() {
                    break Ok(());
                }
            }
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        }
    };

    if json {
        match serde_json::to_string_pretty(&cpu.snapshot()) {
            Ok(out) => println!("{}", out),
            Err(e) => {
                eprintln!("❌ Failed to serialize snapshot: {}", e);
                std::process::exit(1);
            }
        }
        if result.is_err() {
            std::process::exit(1);
        }
        return;
    }

    println!();
    println!("━━━ Result ━━━");
    println!("State:  {:?}", cpu.state());
    println!("Steps:  {}", cpu.steps());
    println!("PC:     {}", cpu.pc());

    if let Err(e) = &result {
        if let Some(instr) = cpu.last_instruction() {
            eprintln!(
                "❌ Fault at PC={}: {} ({})",
                cpu.pc(),
                e,
                mipsim::asm::format_instruction(&instr)
            );
        } else {
            eprintln!("❌ Fault at PC={}: {}", cpu.pc(), e);
        }
    }

    println!();
    println!("Non-zero registers:");
    for (i, &value) in cpu.regs.as_slice().iter().enumerate() {
        if value != 0 {
            println!("  ${:<4} = {} ({:#010x})", REG_NAMES[i], value, value);
        }
    }

    let cache = cpu.cache.stats();
    let bus = cpu.bus.stats();
    println!();
    println!("Cache: {} hits, {} misses ({:.1}% hit rate)",
        cache.hits,
        cache.misses,
        cache.hit_rate() * 100.0
    );
    println!("Bus:   {} reads, {} writes", bus.reads, bus.writes);

    if result.is_err() {
        std::process::exit(1);
    }
}

fn disasm_program(path: &str) {
    match assemble(&read_file(path)) {
        Ok(program) => println!("{}", disassemble(&program)),
        Err(e) => {
            eprintln!("❌ Assembly error: {}", e);
            std::process::exit(1);
        }
    }
}
