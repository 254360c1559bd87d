use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Quoria - a quorum-based blockchain node
#[derive(Parser)]
#[command(name = "quoria")]
#[command(about = "Quoria node and utilities")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a Quoria node
    Run {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,
    },

    /// Initialize a new node configuration
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },

    /// Generate a new keypair
    Keygen {
        /// Output file for secret key
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show node status
    Status {
        /// RPC endpoint
        #[arg(short, long, default_value = "http://127.0.0.1:8545")]
        endpoint: String,
    },

    /// Submit a transfer transaction
    Tx {
        /// RPC endpoint
        #[arg(short, long, default_value = "http://127.0.0.1:8545")]
        endpoint: String,

        /// Sender account key
        #[arg(long)]
        from: String,

        /// Recipient account key
        #[arg(long)]
        to: String,

        /// Amount to move
        #[arg(long)]
        amount: i64,

        /// Transaction UID; generated when absent
        #[arg(long)]
        uid: Option<String>,
    },
}
