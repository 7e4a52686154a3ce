//! Run-level errors
//!
//! Per-scenario failures never surface here; they are encoded in the
//! scenario's `ResultRecord`.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a whole run
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Failed to merge result logs into {path}: {source}")]
    Merge {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to prepare log directory {path}: {source}")]
    LogDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Scenario discovery failed: {0}")]
    Discovery(String),
}
