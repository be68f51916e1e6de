//! CLI module for prefetchr - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for cache warming and
//! admission checks.

pub mod commands;

pub use commands::Cli;
