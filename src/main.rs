//! Tonearm CLI - Loudness Metering and Rendering
//!
//! Command-line interface for the tonearm library.

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tonearm::cli::{commands, Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG overrides the verbosity flag
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("Tonearm v{}", env!("CARGO_PKG_VERSION"));

    let (action, result) = match cli.command {
        Commands::Analyze {
            paths,
            json,
            frames,
            target,
        } => ("analysis", commands::analyze(&paths, json, frames, target)),
        Commands::Render {
            input,
            config,
            output,
        } => (
            "render",
            commands::render(&input, &config, &output).map(|_| ()),
        ),
    };

    if let Err(err) = &result {
        for hint in err.recovery_suggestions() {
            eprintln!("hint: {}", hint);
        }
    }
    result.with_context(|| format!("{} failed", action))
}
