//! LA-core coprocessor simulator CLI.
//!
//! This binary drives one coprocessor through a JSON host program. It performs:
//! 1. **Run:** Preload storage, execute every instruction in order, print outcomes and dumps.
//! 2. **Check:** Validate a configuration and a program without simulating.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use lacore_core::config::Config;
use lacore_core::sim::{DEFAULT_MAX_CYCLES, Program, Simulator};
use lacore_core::stats::STATS_SECTIONS;

#[derive(Parser, Debug)]
#[command(
    name = "lacore",
    author,
    version,
    about = "LA-core coprocessor timing simulator",
    long_about = "Run a JSON host program on a simulated LA-core.\n\nExamples:\n  lacore run --program prog.json\n  lacore run --config atomic.json --program prog.json --stats summary,memory\n  lacore check --config timing.json --program prog.json"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a program and print its report as JSON.
    Run {
        /// Hardware configuration (JSON). Built-in defaults when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Host program (JSON).
        #[arg(short, long)]
        program: PathBuf,

        /// Statistics sections to print after the run (comma separated).
        #[arg(long, value_delimiter = ',')]
        stats: Vec<String>,

        /// Cycles one instruction may take before the run is abandoned.
        #[arg(long, default_value_t = DEFAULT_MAX_CYCLES)]
        max_cycles: u64,
    },

    /// Validate a configuration and a program.
    Check {
        /// Hardware configuration (JSON). Built-in defaults when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Host program (JSON).
        #[arg(short, long)]
        program: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Run {
            config,
            program,
            stats,
            max_cycles,
        } => cmd_run(config.as_deref(), &program, &stats, max_cycles),
        Commands::Check { config, program } => cmd_check(config.as_deref(), &program),
    };
    process::exit(code);
}

/// Loads the configuration file, or the defaults when none is given.
fn load_config(path: Option<&Path>) -> Option<Config> {
    let loaded = path.map_or_else(|| Ok(Config::default()), Config::from_file);
    match loaded {
        Ok(config) => Some(config),
        Err(e) => {
            error!(error = %e, "invalid configuration");
            eprintln!("Error: {e}");
            None
        }
    }
}

fn load_program(path: &Path) -> Option<Program> {
    match Program::from_file(path) {
        Ok(program) => Some(program),
        Err(e) => {
            eprintln!("Error reading program {}: {e}", path.display());
            None
        }
    }
}

/// Runs the program and prints the JSON report, then the requested statistics.
///
/// Returns the process exit code: 0 when every instruction retired without a
/// fault, 2 when some faulted, 1 when the run could not finish.
fn cmd_run(config: Option<&Path>, program: &Path, stats: &[String], max_cycles: u64) -> i32 {
    let Some(config) = load_config(config) else {
        return 1;
    };
    let Some(program) = load_program(program) else {
        return 1;
    };
    for section in stats {
        if !STATS_SECTIONS.contains(&section.as_str()) {
            eprintln!(
                "Error: unknown stats section '{section}' (expected one of {})",
                STATS_SECTIONS.join(", ")
            );
            return 1;
        }
    }

    let mut sim = match Simulator::new(&config) {
        Ok(sim) => sim,
        Err(e) => {
            eprintln!("Error: {e}");
            return 1;
        }
    };
    sim.max_cycles = max_cycles;

    let report = match sim.run_program(&program) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("\n[!] Run aborted at cycle {}: {e}", sim.core.now());
            sim.core.stats.print(sim.core.cache().counters());
            return 1;
        }
    };

    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error encoding report: {e}");
            return 1;
        }
    }
    if !stats.is_empty() {
        sim.core
            .stats
            .print_sections(stats, sim.core.cache().counters());
    }

    if report.outcomes.iter().any(|o| o.result.is_err()) {
        2
    } else {
        0
    }
}

fn cmd_check(config: Option<&Path>, program: &Path) -> i32 {
    if load_config(config).is_none() {
        return 1;
    }
    let Some(program) = load_program(program) else {
        return 1;
    };
    println!(
        "ok: {} preloads, {} instructions, {} dumps",
        program.preload.len(),
        program.instructions.len(),
        program.dump.len()
    );
    0
}
