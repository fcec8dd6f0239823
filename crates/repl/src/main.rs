//! `fjord`: the interactive REPL.
//!
//! Reads lines, accumulates multi-line `:` … `;` definitions into a single
//! compile unit, and feeds everything else to the outer interpreter. Prints
//! `Ok` after a successful line and a one-line diagnostic on error; runtime
//! errors additionally reset the stacks. SIGINT raises the escape flag
//! consumed by loop-check code instead of killing the process.
//!
//! Meta-commands (outside the language):
//!
//! ```text
//! .log on|off        assembly listing + progress lines
//! .loopcheck on|off  escape polling in compiled loops
//! .autoreset on|off  code-buffer reset at definition start
//! .mem               dictionary / arena report
//! .dump <addr> [n]   hex dump of n cells at addr
//! .strings           interner listing
//! .quit              leave
//! ```

use clap::Parser;
use fjord_jit::{Machine, MachineConfig};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser)]
#[command(name = "fjord")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Fjord - a JIT-compiled stack language", long_about = None)]
struct Cli {
    /// Run a startup script before going interactive
    #[arg(long, value_name = "PATH")]
    load: Option<PathBuf>,

    /// Interpret one input and exit
    #[arg(long, value_name = "TEXT")]
    eval: Option<String>,

    /// Configuration file (defaults to ./fjord.toml when present)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable the assembly/progress logging toggle
    #[arg(long)]
    log: bool,

    /// Enable the loop-check (escape polling) toggle
    #[arg(long)]
    loop_check: bool,

    /// Skip the embedded prelude vocabulary
    #[arg(long)]
    no_prelude: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref());
    if cli.log {
        config.logging = true;
    }
    if cli.loop_check {
        config.loop_check = true;
    }

    let mut machine = match Machine::with_config(config) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("failed to start: {}", e);
            std::process::exit(1);
        }
    };

    install_sigint_handler();

    if !cli.no_prelude {
        if let Err(e) = fjord_jit::prelude::install(&mut machine) {
            eprintln!("prelude failed: {}", e);
        }
    }

    if let Some(path) = &cli.load {
        match std::fs::read_to_string(path) {
            Ok(text) => run_input(&mut machine, &text),
            Err(e) => {
                eprintln!("cannot read {}: {}", path.display(), e);
                std::process::exit(1);
            }
        }
    }

    if let Some(text) = &cli.eval {
        run_input(&mut machine, text);
        return;
    }

    interactive(&mut machine);
}

fn load_config(path: Option<&std::path::Path>) -> MachineConfig {
    let candidate = path
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("fjord.toml"));
    match std::fs::read_to_string(&candidate) {
        Ok(text) => match toml::from_str(&text) {
            Ok(config) => {
                debug!(path = %candidate.display(), "config loaded");
                config
            }
            Err(e) => {
                eprintln!("{}: {}", candidate.display(), e);
                MachineConfig::default()
            }
        },
        Err(_) => MachineConfig::default(),
    }
}

fn interactive(machine: &mut Machine) {
    let mut editor = match DefaultEditor::new() {
        Ok(e) => e,
        Err(e) => {
            eprintln!("line editor unavailable: {}", e);
            return;
        }
    };
    let mut pending = String::new();

    loop {
        let prompt = if pending.is_empty() { "fjord> " } else { "...... " };
        match editor.readline(prompt) {
            Ok(line) => {
                let _ = editor.add_history_entry(line.as_str());
                if pending.is_empty() {
                    match meta_command(machine, line.trim()) {
                        Some(true) => break,
                        Some(false) => continue,
                        None => {}
                    }
                }
                pending.push_str(&line);
                pending.push(' ');
                // Accumulate until every `:` has its `;`.
                if definition_open(&pending) {
                    continue;
                }
                let input = std::mem::take(&mut pending);
                run_input(machine, &input);
            }
            Err(ReadlineError::Interrupted) => {
                pending.clear();
                println!("(interrupted)");
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("read error: {}", e);
                break;
            }
        }
    }
}

fn run_input(machine: &mut Machine, input: &str) {
    if input.trim().is_empty() {
        return;
    }
    fjord_core::clear_escape();
    match machine.interpret(input) {
        Ok(()) => println!("Ok"),
        Err(e) => {
            if e.is_runtime() {
                machine.reset_stacks();
            }
            println!("Error: {}", e);
        }
    }
}

/// True while a `:` definition has not yet seen its `;`.
fn definition_open(text: &str) -> bool {
    let mut open = false;
    for token in text.split_whitespace() {
        match token {
            ":" => open = true,
            ";" => open = false,
            _ => {}
        }
    }
    open
}

/// Handle a dot-command. `None` means the line is not a meta-command (words
/// like `.` and `.s` also start with a dot); `Some(true)` means quit.
fn meta_command(machine: &mut Machine, line: &str) -> Option<bool> {
    let mut parts = line.split_whitespace();
    let command = parts.next().unwrap_or("");
    const KNOWN: &[&str] = &[
        ".quit",
        ".log",
        ".loopcheck",
        ".autoreset",
        ".mem",
        ".dump",
        ".strings",
    ];
    if !KNOWN.contains(&command) {
        return None;
    }
    match command {
        ".quit" => return Some(true),
        ".log" => {
            let on = parts.next() == Some("on");
            machine.set_logging(on);
            println!("logging {}", if on { "on" } else { "off" });
        }
        ".loopcheck" => {
            let on = parts.next() == Some("on");
            machine.set_loop_check(on);
            println!("loop-check {}", if on { "on" } else { "off" });
        }
        ".autoreset" => {
            let on = parts.next() != Some("off");
            machine.set_auto_reset(on);
            println!("auto-reset {}", if on { "on" } else { "off" });
        }
        ".mem" => {
            println!("dictionary entries: {}", machine.dictionary().len());
            println!("arena bytes:        {}", machine.dictionary().arena_bytes());
            println!("code pages:         {}", machine.page_count());
        }
        ".dump" => match parse_dump_args(&mut parts) {
            Some((addr, cells)) => dump_cells(addr, cells),
            None => println!("usage: .dump <addr> [cells]"),
        },
        ".strings" => machine.interner.display_list(),
        _ => unreachable!("filtered by KNOWN"),
    }
    Some(false)
}

fn parse_dump_args<'a>(parts: &mut impl Iterator<Item = &'a str>) -> Option<(u64, usize)> {
    let addr_text = parts.next()?;
    let addr = if let Some(hex) = addr_text.strip_prefix("0x") {
        u64::from_str_radix(hex, 16).ok()?
    } else {
        addr_text.parse::<u64>().ok()?
    };
    let cells = match parts.next() {
        Some(n) => n.parse::<usize>().ok()?,
        None => 8,
    };
    Some((addr, cells.min(512)))
}

/// Hex-dump `cells` 64-bit cells starting at `addr`. No validation is
/// possible; this is a debugger command and trusts the operator.
fn dump_cells(addr: u64, cells: usize) {
    for i in 0..cells {
        let p = (addr + (i as u64) * 8) as *const u64;
        let value = unsafe { std::ptr::read_unaligned(p) };
        println!(
            "{:016x}: {} {}",
            addr + (i as u64) * 8,
            hex::encode(value.to_le_bytes()),
            value as i64
        );
    }
}

#[cfg(unix)]
fn install_sigint_handler() {
    // Async-signal-safe: the handler only stores to an atomic.
    let result = unsafe {
        signal_hook::low_level::register(signal_hook::consts::SIGINT, || {
            fjord_core::raise_escape();
        })
    };
    if result.is_err() {
        eprintln!("warning: SIGINT handler not installed");
    }
}

#[cfg(not(unix))]
fn install_sigint_handler() {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition_open_tracking() {
        assert!(definition_open(": sq dup * "));
        assert!(!definition_open(": sq dup * ;"));
        assert!(!definition_open("1 2 +"));
        assert!(definition_open(": a 1 ; : b 2 "));
    }

    #[test]
    fn test_parse_dump_args() {
        let mut parts = "0x1000 4".split_whitespace();
        assert_eq!(parse_dump_args(&mut parts), Some((0x1000, 4)));
        let mut parts = "64".split_whitespace();
        assert_eq!(parse_dump_args(&mut parts), Some((64, 8)));
        let mut parts = "junk".split_whitespace();
        assert_eq!(parse_dump_args(&mut parts), None);
    }
}
