//! rlwf CLI - Command line interface for RL workflow configurations
//!
//! The external workflow runner consumes one YAML document per run. This CLI
//! checks such documents, shows what the runner will see, and prepares the
//! working directory before a run.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::too_many_lines)]

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod logging;

use commands::{init, inspect, prepare, validate};

#[derive(Parser)]
#[command(name = "rlwf")]
#[command(author, version, about = "rlwf - RL workflow configuration tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a workflow file; exits non-zero if it is malformed or incomplete
    Validate(validate::ValidateArgs),

    /// Print the normalized workflow document
    Show(inspect::ShowArgs),

    /// Print the evaluation and checkpoint plan
    Schedule(inspect::ScheduleArgs),

    /// Print the environment each runner component receives
    Env(inspect::EnvArgs),

    /// Create run directories and per-component env files
    Prepare(prepare::PrepareArgs),

    /// Write a workflow template
    Init(init::InitArgs),
}

fn main() -> Result<()> {
    // Load environment from rlwf.env file (before parsing args)
    rlwf_core::util::load_env_file();

    let cli = Cli::parse();

    // prepare logs through the workflow's own logging section
    if !matches!(cli.command, Commands::Prepare(_)) {
        logging::init(cli.verbose);
    }

    match cli.command {
        Commands::Validate(args) => validate::run(&args),
        Commands::Show(args) => inspect::show(&args),
        Commands::Schedule(args) => inspect::schedule(&args),
        Commands::Env(args) => inspect::env(&args),
        Commands::Prepare(args) => prepare::run(&args, cli.verbose),
        Commands::Init(args) => init::run(&args),
    }
}
