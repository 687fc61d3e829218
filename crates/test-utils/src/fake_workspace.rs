use std::path::PathBuf;

use watchbazel::errors::Result;
use watchbazel::workspace::WorkspaceFinder;

/// Workspace finder pinned to a fixed root.
#[derive(Debug, Clone)]
pub struct FakeWorkspaceFinder {
    root: PathBuf,
}

impl FakeWorkspaceFinder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl WorkspaceFinder for FakeWorkspaceFinder {
    fn find_workspace(&self) -> Result<PathBuf> {
        Ok(self.root.clone())
    }
}
