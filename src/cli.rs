use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "metaforged")]
#[command(author, version, about = "Metadata cache and resolution toolkit for media centers")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect and maintain the metadata cache
    Cache {
        #[command(subcommand)]
        action: CacheCommand,
    },

    /// Fuzzy-resolve a name against the entries of a folder
    Match {
        /// Folder to search
        parent: String,

        /// Name to look for
        name: String,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

#[derive(Subcommand)]
pub enum CacheCommand {
    /// Print the cached JSON for a key, or "miss"
    Get {
        key: String,

        /// Only accept an entry stored with this checksum
        #[arg(long)]
        checksum: Option<String>,
    },

    /// Store a JSON value under a key
    Set {
        key: String,

        /// JSON payload
        json: String,

        /// Time to live in seconds (defaults to the configured TTL)
        #[arg(long)]
        ttl_secs: Option<u64>,

        #[arg(long)]
        checksum: Option<String>,
    },

    /// Remove one entry
    Remove { key: String },

    /// Delete all expired entries
    Purge,

    /// Show entry counts
    Stats,
}
