// src/errors.rs

//! Crate-wide error type and result alias.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatchbazelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("filesystem watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("bazel {operation} failed: {message}")]
    QueryFailed { operation: String, message: String },

    #[error("cannot watch {path}")]
    UnwatchableTarget {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("no rule information available for {0}")]
    NoRuleInfo(String),

    #[error("workspace root not found above {0}")]
    WorkspaceNotFound(PathBuf),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, WatchbazelError>;
