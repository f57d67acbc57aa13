//! # en10168 CLI entry point
//!
//! Parses command-line arguments, initializes logging from the `-v` count
//! and dispatches to the subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use en10168_cli::check_schema::{run_check_schema, CheckSchemaArgs};
use en10168_cli::validate::{run_validate, ValidateArgs};

/// EN 10168 certificate validator.
///
/// Validates inspection certificates against the EN 10168 rule set and
/// reports every violation with its document and rule location.
#[derive(Parser, Debug)]
#[command(name = "en10168", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to a validator configuration file (YAML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate certificate files.
    Validate(ValidateArgs),

    /// Compile the rule set and report its size.
    CheckSchema(CheckSchemaArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();
    let result = match &cli.command {
        Commands::Validate(args) => run_validate(args, config),
        Commands::CheckSchema(args) => run_check_schema(args, config),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
