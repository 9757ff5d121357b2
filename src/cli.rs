//! Command-line interface definitions for fili.
//!
//! Global options (verbosity, color, configuration) come first, then one
//! subcommand per operation.
//!
//! # Example
//!
//! ```bash
//! # Index a directory with full hashing
//! fili index create ~/Photos
//!
//! # Index quickly (fastsum only) under a chosen name
//! fili index create /mnt/backup --name backup --fast
//!
//! # Show duplicate groups as JSON
//! fili dupes list --output json
//!
//! # Verbose mode for debugging
//! fili -v index update backup
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// File library indexer.
///
/// fili records a fingerprint of every file under a directory in a local
/// database, finds duplicates among indexed files, and moves indexes between
/// machines as JSON documents.
#[derive(Debug, Parser)]
#[command(name = "fili")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Print errors as JSON objects on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Configuration file (default: platform config dir, config.toml)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Index database file (default: ~/.fili.db)
    #[arg(long, value_name = "PATH", global = true)]
    pub database: Option<PathBuf>,

    /// Number of fingerprinting threads
    ///
    /// Lower values reduce disk thrashing on HDDs.
    #[arg(long, value_name = "N", global = true)]
    pub io_threads: Option<usize>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create, list, move and compare scans
    Index {
        #[command(subcommand)]
        command: IndexCommand,
    },
    /// Find and remove duplicate files
    Dupes {
        #[command(subcommand)]
        command: DupesCommand,
    },
    /// Find indexed files whose path contains a string
    Search(SearchArgs),
    /// Show the most recently accessed indexed files
    Recent(RecentArgs),
    /// Remove files from the index without touching the disk
    Unindex(UnindexArgs),
    /// Show index totals
    Stats(StatsArgs),
    /// Print the effective configuration as TOML
    Config,
}

#[derive(Debug, Subcommand)]
pub enum IndexCommand {
    /// Index a directory as a new scan
    Create(CreateArgs),
    /// List scans
    List(ListArgs),
    /// Write a scan as a JSON document
    Export(ExportArgs),
    /// Read a scan from a JSON document
    Import(ImportArgs),
    /// Delete a scan and all of its files
    Delete(DeleteScanArgs),
    /// Rescan the root of an existing scan, replacing its files
    Update(UpdateArgs),
    /// Compare two scans
    Diff(DiffArgs),
}

/// Arguments for `index create`.
#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Directory to index
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Scan name (default: directory name and current minute)
    #[arg(long)]
    pub name: Option<String>,

    /// Skip the SHA-1 hash and record only the fastsum
    #[arg(long)]
    pub fast: bool,

    /// Index only the top level of PATH
    #[arg(long)]
    pub no_recurse: bool,

    /// Follow symbolic links during the walk
    ///
    /// Cycles are detected and skipped.
    #[arg(long)]
    pub follow_symlinks: bool,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Show machine, root, creation time and file count
    #[arg(short, long)]
    pub long: bool,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Scan to export
    pub name: String,

    /// Output file (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Document written by `index export`
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

#[derive(Debug, Args)]
pub struct DeleteScanArgs {
    /// Scan to delete
    pub name: String,
}

#[derive(Debug, Args)]
pub struct UpdateArgs {
    /// Scan to rescan
    pub name: String,

    /// Skip the SHA-1 hash and record only the fastsum
    #[arg(long)]
    pub fast: bool,
}

#[derive(Debug, Args)]
pub struct DiffArgs {
    /// Scan compared against
    pub reference: String,

    /// Scan compared
    pub other: String,

    /// Copy files only present in REFERENCE into this directory
    #[arg(long, value_name = "DIR")]
    pub copy_diff: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

#[derive(Debug, Subcommand)]
pub enum DupesCommand {
    /// Show duplicate groups; the first file of each group is kept
    List(DupesListArgs),
    /// Delete every duplicate except the first of each group
    Delete(DupesDeleteArgs),
}

#[derive(Debug, Args)]
pub struct DupesListArgs {
    /// Only consider files of this scan
    #[arg(long, value_name = "NAME")]
    pub scan: Option<String>,

    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

#[derive(Debug, Args)]
pub struct DupesDeleteArgs {
    /// Only consider files of this scan
    #[arg(long, value_name = "NAME")]
    pub scan: Option<String>,

    /// Use permanent deletion instead of moving to trash
    ///
    /// Warning: Files cannot be recovered after permanent deletion.
    #[arg(long)]
    pub permanent: bool,

    /// Show what would be deleted without deleting anything
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Substring to look for in stored paths
    pub query: String,
}

#[derive(Debug, Args)]
pub struct RecentArgs {
    /// Number of files to show
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
}

#[derive(Debug, Args)]
pub struct UnindexArgs {
    /// Path whose rows are removed, together with everything below it
    #[arg(value_name = "PATH")]
    pub prefix: PathBuf,

    /// Remove only rows for exactly PATH
    #[arg(long)]
    pub strict: bool,
}

#[derive(Debug, Args)]
pub struct StatsArgs {
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Output format for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable lines
    Text,
    /// JSON for scripting
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
