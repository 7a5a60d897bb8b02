//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Window focus logger.
///
/// Records which window had focus and when the user went idle, then rebuilds
/// the time spent in each window from those records.
#[derive(Debug, Parser)]
#[command(name = "fl", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Append a single event to the log.
    Record {
        #[command(subcommand)]
        event: RecordEvent,
    },

    /// Read poller samples as JSON lines on stdin and log the resulting events.
    Observe,

    /// Rebuild sessions from every partition and write them out.
    Analyze {
        /// Output format.
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,

        /// Write to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Carry a session left open at the end of one day into the next.
        #[arg(long)]
        carry: bool,
    },

    /// List day partitions with their row counts.
    Partitions,

    /// Show minutes per day, optionally only for matching window titles.
    Report {
        /// Space-separated words; a title matching any of them counts.
        #[arg(short, long)]
        query: Option<String>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show where data lives and what it covers.
    Status,
}

/// Event types that can be recorded by hand.
#[derive(Debug, Subcommand)]
pub enum RecordEvent {
    /// Record that a window gained focus.
    Focus {
        /// Executable name, e.g. `firefox.exe`.
        #[arg(long)]
        exe: String,

        /// Window title.
        #[arg(long)]
        title: String,

        /// When focus changed (RFC 3339, epoch seconds, or "5 minutes ago"). Defaults to now.
        #[arg(long)]
        at: Option<String>,
    },

    /// Record a span with no keyboard or mouse input.
    Idle {
        /// When input stopped.
        #[arg(long)]
        start: String,

        /// When input resumed.
        #[arg(long)]
        end: String,
    },
}

/// Session export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Csv,
}
