// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WarmdagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Cycle detected in warm-up graph: {0}")]
    DagCycle(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Fatal outcomes of a single warm-up run.
///
/// Individual stageable failures are never reported here; they go to the
/// run's `StageHandler`.
#[derive(Error, Debug)]
pub enum WarmUpError {
    #[error("warm-up did not complete within {waited:?}")]
    Timeout {
        waited: Duration,
        #[source]
        source: tokio::time::error::Elapsed,
    },

    #[error("dependency cycle detected during warm-up: {}", .cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },

    #[error("root warm-up task failed: {0}")]
    RootTask(String),

    #[error("failed to build warm-up worker pool: {0}")]
    WorkerPool(#[source] std::io::Error),

    #[error("stage_blocking called from inside a Tokio runtime; await stage_with instead")]
    InsideRuntime,
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, WarmdagError>;
