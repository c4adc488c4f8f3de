//! Stitch CLI - component tag compiler and renderer.
//!
//! Provides commands for:
//! - `compile`: Print the directive text a template compiles to
//! - `render`: Render a template with a JSON context
//! - `check`: Compile and parse templates without rendering them

mod commands;
mod error;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{CheckArgs, CompileArgs, RenderArgs};
use output::Output;

/// Stitch - component tags for directive templates.
#[derive(Parser)]
#[command(name = "stitch", version, about)]
struct Cli {
    /// Path to configuration file (default: auto-discover stitch.toml).
    #[arg(short, long, global = true, env = "STITCH_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output (cache and compilation logs).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile custom tags in a file and print the result.
    Compile(CompileArgs),
    /// Render a template from the configured template directories.
    Render(RenderArgs),
    /// Check that templates compile and parse.
    Check(CheckArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Compile(args) => args.execute(config),
        Commands::Render(args) => args.execute(config),
        Commands::Check(args) => args.execute(config),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
