// src/logging.rs

//! Log output for `taskhelper`: `tracing` events to stderr through
//! `tracing-subscriber`, leaving stdout to `--dry-run`.
//!
//! The filter is taken from the first of:
//! 1. `--log-level`,
//! 2. `TASKHELPER_LOG`, either a plain level (`debug`) or `EnvFilter`
//!    directives (`info,taskhelper::store=trace`),
//! 3. `info`.

use anyhow::{anyhow, Result};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::cli::LogLevel;

/// Environment variable consulted when no `--log-level` is given.
pub const LOG_ENV_VAR: &str = "TASKHELPER_LOG";

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env_value = std::env::var(LOG_ENV_VAR).ok();
    let filter = build_filter(cli_level, env_value.as_deref());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!("installing log subscriber: {err}"))
}

/// Filter for the given flag and environment value.
///
/// An env value that is neither a level nor valid directives falls back to
/// `info`.
pub fn build_filter(cli_level: Option<LogLevel>, env_value: Option<&str>) -> EnvFilter {
    if let Some(level) = cli_level {
        return level_filter(Level::from(level));
    }

    let Some(value) = env_value.map(str::trim).filter(|v| !v.is_empty()) else {
        return level_filter(Level::INFO);
    };
    if let Some(level) = parse_level_str(value) {
        return level_filter(level);
    }
    EnvFilter::try_new(value).unwrap_or_else(|_| level_filter(Level::INFO))
}

fn level_filter(level: Level) -> EnvFilter {
    EnvFilter::default().add_directive(level.into())
}

impl From<LogLevel> for Level {
    fn from(lvl: LogLevel) -> Self {
        match lvl {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

/// Parse a plain level name, ignoring case. `warning` is accepted.
pub fn parse_level_str(s: &str) -> Option<Level> {
    match s.trim().to_ascii_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}
