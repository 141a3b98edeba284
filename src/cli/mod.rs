//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Run test suites in a bounded pool of worker processes
#[derive(Parser, Debug)]
#[command(name = "suitepool")]
#[command(author = "hephaex@gmail.com")]
#[command(version)]
#[command(about = "Run test suites in a bounded pool of worker processes")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (defaults to the standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run suites from a manifest
    Run(RunArgs),

    /// List suites and cases of a manifest
    List(ListArgs),

    /// Show or create configuration
    Config(ConfigArgs),

    /// Execute one suite read from stdin and report on stdout
    #[command(hide = true)]
    Worker,
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Suite manifest (YAML or JSON)
    #[arg(short, long)]
    pub manifest: Option<PathBuf>,

    /// Worker processes (0 or less: one per CPU)
    #[arg(short, long, allow_negative_numbers = true)]
    pub processes: Option<i32>,

    /// Seconds to wait for a free worker slot
    #[arg(long)]
    pub process_timeout: Option<u64>,

    /// Only run these suites (repeatable)
    #[arg(short, long = "suite")]
    pub suites: Vec<String>,

    /// Only run cases whose name contains this pattern
    #[arg(short = 'k', long)]
    pub pattern: Option<String>,

    /// Output format (table, summary, json, json-pretty, csv)
    #[arg(short, long)]
    pub format: Option<String>,

    /// Also save the report to file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

/// Arguments for list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Suite manifest (YAML or JSON)
    #[arg(short, long)]
    pub manifest: Option<PathBuf>,

    /// Show commands and expectations of each case
    #[arg(short, long)]
    pub detailed: bool,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Write an example configuration file
    Init {
        /// Destination path
        #[arg(default_value = "suitepool.yaml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Describe environment variables
    Env,
}
