// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `taskhelper`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "taskhelper",
    version,
    about = "Filter changed files and merge sources through handler pipelines.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `TaskHelper.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "TaskHelper.toml")]
    pub config: String,

    /// Run only these targets, in this order (repeatable).
    ///
    /// If omitted, every target runs in name order.
    #[arg(long = "target", value_name = "NAME")]
    pub targets: Vec<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TASKHELPER_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print targets, but don't touch any file.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
