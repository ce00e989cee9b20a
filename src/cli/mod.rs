//! CLI Module
//!
//! Command-line interface for metering and rendering WAV files.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Tonearm - loudness metering and offline mastering
#[derive(Parser, Debug)]
#[command(name = "tonearm")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Meter WAV files and print their loudness
    #[command(name = "analyze")]
    Analyze {
        /// WAV files, or directories searched for .wav files
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,

        /// Print every emitted frame, not only the final one
        #[arg(long)]
        frames: bool,

        /// Target loudness for the gain-to-target reading (LUFS)
        #[arg(long, allow_hyphen_values = true)]
        target: Option<f64>,
    },

    /// Render a WAV file through an effect chain
    #[command(name = "render")]
    Render {
        /// Input WAV file
        input: PathBuf,

        /// Effect chain (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_analyze() {
        let cli = Cli::parse_from(["tonearm", "analyze", "a.wav", "b", "--json", "--target", "-16"]);
        match cli.command {
            Commands::Analyze {
                paths,
                json,
                frames,
                target,
            } => {
                assert_eq!(paths, vec![PathBuf::from("a.wav"), PathBuf::from("b")]);
                assert!(json);
                assert!(!frames);
                assert_eq!(target, Some(-16.0));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_render() {
        let cli = Cli::parse_from([
            "tonearm", "-v", "render", "in.wav", "-c", "chain.json", "-o", "out.wav",
        ]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Render { .. }));
    }

    #[test]
    fn test_analyze_requires_path() {
        assert!(Cli::try_parse_from(["tonearm", "analyze"]).is_err());
    }
}
