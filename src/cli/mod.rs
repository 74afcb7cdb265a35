//! Command-line interface for the folio server and its maintenance tasks.

mod commands;

use clap::{Parser, Subcommand};

/// Folio - portfolio content API
#[derive(Parser)]
#[command(name = "folio")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API and the backup retention scheduler (default)
    #[command(alias = "daemon")]
    Serve,

    /// Create a default config file
    Init,

    /// Create the default content record if none exists
    Seed,

    /// Create a back-office user
    CreateUser {
        username: String,
        /// admin or editor
        #[arg(long, default_value = "editor")]
        role: String,
        /// Generated and printed when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// Enable or disable an account
    SetStatus {
        username: String,
        /// active or disabled
        status: String,
    },

    /// Show recent backups of the active content
    #[command(alias = "history")]
    Backups {
        #[arg(default_value = "10")]
        limit: u64,
    },

    /// Delete backups older than the retention window
    PruneBackups,
}

pub use commands::*;
