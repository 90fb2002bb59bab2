//! Harch Command-Line Interface
//!
//! Runs the entanglement-distillation controller from a YAML experiment
//! file and reports emitted pairs and fidelity statistics.
//!
//! ```text
//!   input ──▶ memory ──▶ distillation ──▶ distilled memory ──▶ output
//!                 ▲            │   ▲              │
//!                 └────────────┘   └──────────────┘
//!
//!                      H A R C H
//!        Entanglement distillation microarchitecture
//! ```

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{config, run, version};

/// Harch - entanglement distillation controller simulator
#[derive(Parser)]
#[command(name = "harch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate the controller and report emitted pairs
    Run {
        /// Experiment file (YAML); built-in defaults if omitted
        #[arg(short, long, env = "HARCH_CONFIG")]
        config: Option<String>,

        /// Override the number of ticks
        #[arg(long)]
        cycles: Option<u64>,

        /// Override the RNG seed
        #[arg(long)]
        seed: Option<u64>,

        /// Override the physics model (dm, werner)
        #[arg(short, long)]
        physics: Option<String>,

        /// Output file for the JSON report
        #[arg(short, long)]
        export: Option<String>,

        /// Hide the progress bar
        #[arg(short, long)]
        quiet: bool,
    },

    /// Print the default experiment file
    Config {
        /// Physics model to emit parameters for (dm, werner)
        #[arg(short, long, default_value = "werner")]
        physics: String,
    },

    /// Show version information
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Run {
            config,
            cycles,
            seed,
            physics,
            export,
            quiet,
        } => run::execute(
            config.as_deref(),
            cycles,
            seed,
            physics.as_deref(),
            export.as_deref(),
            quiet,
        ),

        Commands::Config { physics } => config::execute(&physics),

        Commands::Version => {
            version::execute();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
