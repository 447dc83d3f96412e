//! CLI argument parsing for Vigia

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::digest::DigestPeriod;

/// Output format for run reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable text (default)
    Text,
    /// JSON for downstream renderers
    Json,
}

/// Output format for health digests
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DigestFormat {
    /// Markdown for chat or PR comments (default)
    Markdown,
    /// Plain text
    Text,
    /// JSON for downstream renderers
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "vigia")]
#[command(version)]
#[command(
    about = "Test history analytics: flakiness, performance drift, stability and failure clustering",
    long_about = None
)]
pub struct Cli {
    /// Enable debug tracing output to stderr
    #[arg(long, global = true)]
    pub debug: bool,

    /// Log progress to stderr (repeat for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Annotate a completed run against history and record it
    Analyze {
        /// Test results JSON (array, or object with `results`)
        #[arg(short, long, value_name = "FILE")]
        results: PathBuf,

        /// History file; created if missing
        #[arg(long, value_name = "FILE")]
        history: PathBuf,

        /// TOML configuration file
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Run identifier (default: derived from the run timestamp)
        #[arg(long, value_name = "ID")]
        run_id: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: ReportFormat,

        /// Write the report to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Analyze without recording the run in history
        #[arg(long)]
        no_save: bool,
    },

    /// Summarize drift over a trailing window of history
    Digest {
        /// History file
        #[arg(long, value_name = "FILE")]
        history: PathBuf,

        /// Window length (default: from config, else weekly)
        #[arg(long, value_enum)]
        period: Option<DigestPeriod>,

        /// Output format
        #[arg(long, value_enum, default_value = "markdown")]
        format: DigestFormat,

        /// TOML configuration file
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Convert a pytest-json-report file into test results
    ConvertPytest {
        /// pytest-json-report output
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Write the converted results to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}
