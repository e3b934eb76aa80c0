//! CLI argument definitions using clap
//!
//! Commands:
//! - atomix init --config <path>
//! - atomix exec --config <path>
//! - atomix gc --config <path> --identity <id> [--max-versions <n>]
//! - atomix inspect --config <path> --identity <id> --key <key>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// atomix - MVCC transactional key-value engine
#[derive(Parser, Debug)]
#[command(name = "atomix")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the data directory and an empty chain log
    Init {
        /// Path to configuration file
        #[arg(long, default_value = "./atomix.json")]
        config: PathBuf,
    },

    /// Execute JSON-lines requests from stdin, one response per line
    Exec {
        /// Path to configuration file
        #[arg(long, default_value = "./atomix.json")]
        config: PathBuf,
    },

    /// Trim every chain in an identity's keyspace
    Gc {
        /// Path to configuration file
        #[arg(long, default_value = "./atomix.json")]
        config: PathBuf,

        /// Identity whose keyspace is collected
        #[arg(long)]
        identity: String,

        /// Versions kept per chain (defaults to engine.gc_max_versions)
        #[arg(long)]
        max_versions: Option<usize>,
    },

    /// Print the durable version chain of one key
    Inspect {
        /// Path to configuration file
        #[arg(long, default_value = "./atomix.json")]
        config: PathBuf,

        #[arg(long)]
        identity: String,

        #[arg(long)]
        key: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
