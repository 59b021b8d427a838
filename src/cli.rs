//! Command-line interface for livetrans
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Real-time speech translation
#[derive(Parser, Debug)]
#[command(name = "livetrans", version, about = "Real-time speech translation")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Verbose output (-v: debug logs, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stream a WAV file through the pipeline and write the mixed result
    Run(RunArgs),

    /// List supported languages
    Languages,

    /// Show the voice picked for a target language
    Voices {
        /// Target language code
        #[arg(value_name = "LANG")]
        language: String,

        /// Voice gender (female, male, neutral)
        #[arg(long, value_name = "GENDER")]
        gender: Option<String>,

        /// Speaking style override
        #[arg(long, value_name = "STYLE")]
        style: Option<String>,
    },
}

/// Arguments for `livetrans run`
#[derive(clap::Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Input WAV file
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output WAV file (default: <input>.translated.wav)
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Whisper model path
    #[arg(long, value_name = "PATH")]
    pub model: Option<PathBuf>,

    /// Source language (auto, en, de, gsw, fr, it)
    #[arg(long, value_name = "LANG")]
    pub source: Option<String>,

    /// Target language
    #[arg(long, value_name = "LANG")]
    pub target: Option<String>,

    /// Voice gender (female, male, neutral)
    #[arg(long, value_name = "GENDER")]
    pub gender: Option<String>,

    /// Speaking style override
    #[arg(long, value_name = "STYLE")]
    pub style: Option<String>,

    /// Pace blocks at the file's real-time rate
    #[arg(long)]
    pub realtime: bool,

    /// Print transcripts as JSON lines
    #[arg(long)]
    pub json: bool,
}
