// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::HandlerClass;

#[derive(Error, Debug)]
pub enum TaskHelperError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Target not found: {0}")]
    TargetNotFound(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// A handler returned an error; the rest of the target is skipped.
    #[error("{class} failed in target '{target}': {source:#}")]
    HandlerFailed {
        class: HandlerClass,
        target: String,
        source: anyhow::Error,
    },

    /// The change store could not be persisted.
    #[error("can't write to file {path:?}: {source:#}")]
    StoreWrite {
        path: PathBuf,
        source: anyhow::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TaskHelperError>;
