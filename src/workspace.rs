// src/workspace.rs

//! Workspace discovery.
//!
//! Labels returned by bazel queries are workspace-relative; the engine anchors
//! them to absolute paths by finding the enclosing workspace root.

use std::path::PathBuf;
use std::sync::Arc;

use crate::errors::{Result, WatchbazelError};
use crate::fs::FileSystem;

/// Files whose presence marks a directory as a workspace root.
const WORKSPACE_MARKERS: &[&str] = &["WORKSPACE", "WORKSPACE.bazel", "MODULE.bazel"];

/// Locates the workspace root that queries are resolved against.
pub trait WorkspaceFinder: Send + Sync {
    fn find_workspace(&self) -> Result<PathBuf>;
}

/// Walks up from a starting directory looking for a workspace marker file.
#[derive(Debug, Clone)]
pub struct MainWorkspaceFinder {
    fs: Arc<dyn FileSystem>,
    start: PathBuf,
}

impl MainWorkspaceFinder {
    /// Finder anchored at the current working directory.
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        let start = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self { fs, start }
    }

    /// Finder anchored at an explicit directory.
    pub fn starting_at(fs: Arc<dyn FileSystem>, start: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            start: start.into(),
        }
    }
}

impl WorkspaceFinder for MainWorkspaceFinder {
    fn find_workspace(&self) -> Result<PathBuf> {
        for dir in self.start.ancestors() {
            for marker in WORKSPACE_MARKERS {
                if self.fs.is_file(&dir.join(marker)) {
                    return Ok(dir.to_path_buf());
                }
            }
        }
        Err(WatchbazelError::WorkspaceNotFound(self.start.clone()))
    }
}
