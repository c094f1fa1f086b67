/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use clap::{Parser, Subcommand};
use stackvm_core::vm::{Vm, VmStatus};
use stackvm_core::{HeapConfig, Program, heap::DEFAULT_THRESHOLD};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::exit;
use std::time::Instant;
use utils::dlog;

#[derive(Parser, Debug)]
#[command(author, version, about = "A stack-based bytecode VM with a mark-sweep collector", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute a bytecode file
    Run {
        /// bytecode file to run
        file: PathBuf,

        /// Print instruction count, bytes executed and elapsed time
        #[arg(long)]
        stats: bool,

        /// Print collector statistics after the program halts
        #[arg(long)]
        gc_stats: bool,

        /// Live object count that triggers the first collection
        #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
        gc_threshold: usize,

        /// Collect before every allocation
        #[arg(long)]
        gc_stress: bool,

        /// Report every collection cycle on stderr
        #[arg(long)]
        gc_trace: bool,
    },
    /// Assemble a text program into bytecode
    Asm {
        input: PathBuf,
        output: PathBuf,
    },
    /// Print the instructions in a bytecode file
    Disasm { file: PathBuf },
}

fn c(code: &str) -> &str {
    let use_color = std::io::stderr().is_terminal();

    if use_color { code } else { "" }
}

fn fail(msg: impl std::fmt::Display) -> ! {
    let red = c("\x1b[38;2;230;100;100m");
    let bold = c("\x1b[1m");
    let reset = c("\x1b[0m");
    eprintln!("{red}{bold}error:{reset} {msg}");
    exit(1);
}

fn load(file: &PathBuf) -> Program {
    match Program::load(file) {
        Ok(program) => program,
        Err(err) => fail(format!("{}: {err}", file.display())),
    }
}

fn main() {
    let args = Args::parse();
    dlog!("{args:?}");

    match args.command {
        Command::Run {
            file,
            stats,
            gc_stats,
            gc_threshold,
            gc_stress,
            gc_trace,
        } => {
            let config = HeapConfig {
                initial_threshold: gc_threshold,
                stress: gc_stress,
                trace: gc_trace,
            };
            let mut vm = Vm::with_config(load(&file), config);

            let start = Instant::now();
            vm.run();
            let elapsed = start.elapsed();

            let status = vm.status();
            if let VmStatus::Halted = status {
                match vm.stack().last() {
                    Some(top) => println!("VM HALT. Top = {}", vm.heap().describe(*top)),
                    None => println!("VM HALT. Stack empty."),
                }
            }

            if stats {
                print_stats(&vm, elapsed.as_secs_f64());
            }
            if gc_stats {
                print_gc_stats(&vm);
            }

            if let VmStatus::Error(err) = status {
                fail(err);
            }
        }
        Command::Asm { input, output } => {
            let source = match std::fs::read_to_string(&input) {
                Ok(s) => s,
                Err(err) => fail(format!("could not open file '{}': {err}", input.display())),
            };
            match stackvm_core::assemble(&source) {
                Ok(program) => {
                    if let Err(err) = program.save(&output) {
                        fail(format!("{}: {err}", output.display()));
                    }
                }
                Err(err) => {
                    err.emit(&input.display().to_string(), &source);
                    exit(1);
                }
            }
        }
        Command::Disasm { file } => {
            let program = load(&file);
            print!("{}", stackvm_core::disassemble(program.code()));
        }
    }
}

fn print_stats(vm: &Vm, secs: f64) {
    println!();
    println!("=== VM BENCHMARK RESULTS ===");
    println!("Instructions executed : {}", vm.instr_count());
    println!("Bytes executed        : {}", vm.byte_count());
    println!("Execution time (sec)  : {secs:.6}");
}

fn print_gc_stats(vm: &Vm) {
    let heap = vm.heap();
    let stats = heap.stats();
    println!();
    println!("=== GC STATS ===");
    println!("Collections           : {}", stats.cycles);
    println!("Objects allocated     : {}", stats.total_allocated);
    println!("Objects freed         : {}", stats.total_freed);
    println!("Live objects          : {}", heap.live_count());
    println!("Threshold             : {}", heap.threshold());
}
