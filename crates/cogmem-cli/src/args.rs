//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "cogmem", about = "Cognitive memory engine CLI", version)]
pub struct Cli {
    /// SQLite database path. Defaults to the platform data directory.
    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,

    /// Repository path used for project-id derivation and git-activity
    /// tracking. Defaults to no activity tracking.
    #[arg(long, global = true)]
    pub repo_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Store one experience, returning its generated id.
    Store {
        text: String,

        /// Hierarchy level hint: 0=concept, 1=context, 2=episode.
        #[arg(long)]
        level: Option<u8>,

        #[arg(long = "tag")]
        tag: Vec<String>,

        /// key=value, repeatable.
        #[arg(long = "meta")]
        meta: Vec<String>,
    },

    /// Retrieve core, peripheral, and bridge memories for a query.
    Retrieve {
        query: String,

        #[arg(long, default_value_t = 20)]
        max_results: usize,

        #[arg(long)]
        no_core: bool,

        #[arg(long)]
        no_peripheral: bool,

        #[arg(long)]
        no_bridge: bool,
    },

    /// Run one consolidation cycle, optionally followed by expiration cleanup.
    Consolidate {
        #[arg(long)]
        cleanup: bool,
    },

    /// Load memories and connections from a source file.
    Load { path: PathBuf },

    /// Insert-or-update memories parsed from a source file.
    Upsert { path: PathBuf },
}
