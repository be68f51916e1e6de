//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - warm: prefetch a list of urls against a base origin
//! - check: admission dry-run, shows what would be filtered and why

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// prefetchr - opportunistic resource prefetch scheduler
#[derive(Parser, Debug)]
#[command(name = "prefetchr")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Prefetch urls against a base origin and report outcomes
    Warm {
        /// Base document origin (e.g. https://app.example); falls back to
        /// base_url from the config file
        #[arg(short, long)]
        base: Option<String>,

        /// Urls to prefetch (relative urls resolve against the base)
        urls: Vec<String>,

        /// Read additional urls from a file, one per line
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Force a resource kind (document, image, style, script, font)
        /// instead of guessing from the url extension
        #[arg(short, long)]
        kind: Option<String>,

        /// Priority tier (high, medium, low)
        #[arg(short, long)]
        priority: Option<String>,

        /// Print the final scheduler status as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the admission filter over urls without fetching anything
    Check {
        /// Base document origin
        #[arg(short, long)]
        base: Option<String>,

        /// Urls to check
        urls: Vec<String>,
    },
}
