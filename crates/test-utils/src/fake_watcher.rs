use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use tokio::sync::mpsc;
use watchbazel::errors::Result;
use watchbazel::watch::{FileWatcher, WatchEvent};

/// Watcher facade backed by a plain channel.
///
/// Tests keep a clone as a probe (shared state) plus the returned sender to
/// inject events. `close()` drops the watcher's sender; once the test's
/// sender is dropped too, the engine observes end-of-stream.
#[derive(Clone, Default)]
pub struct FakeWatcher {
    added: Arc<Mutex<Vec<PathBuf>>>,
    removed: Arc<Mutex<Vec<PathBuf>>>,
    fail_adds: Arc<Mutex<HashSet<PathBuf>>>,
    tx: Arc<Mutex<Option<mpsc::UnboundedSender<WatchEvent>>>>,
}

impl FakeWatcher {
    pub fn new() -> (
        Self,
        mpsc::UnboundedReceiver<WatchEvent>,
        mpsc::UnboundedSender<WatchEvent>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let watcher = Self {
            added: Arc::new(Mutex::new(Vec::new())),
            removed: Arc::new(Mutex::new(Vec::new())),
            fail_adds: Arc::new(Mutex::new(HashSet::new())),
            tx: Arc::new(Mutex::new(Some(tx.clone()))),
        };
        (watcher, rx, tx)
    }

    /// Directories passed to `add`, in order.
    pub fn added(&self) -> Vec<PathBuf> {
        self.added.lock().unwrap().clone()
    }

    /// Directories passed to `remove`, in order.
    pub fn removed(&self) -> Vec<PathBuf> {
        self.removed.lock().unwrap().clone()
    }

    /// Make `add` fail for one directory.
    pub fn fail_add_for(&self, path: impl Into<PathBuf>) {
        self.fail_adds.lock().unwrap().insert(path.into());
    }

    pub fn is_closed(&self) -> bool {
        self.tx.lock().unwrap().is_none()
    }

    /// Close from a probe clone (the boxed instance is owned by the engine).
    pub fn close_now(&self) {
        *self.tx.lock().unwrap() = None;
    }
}

impl FileWatcher for FakeWatcher {
    fn add(&mut self, path: &Path) -> Result<()> {
        if self.fail_adds.lock().unwrap().contains(path) {
            return Err(anyhow!("refusing to watch {:?}", path).into());
        }
        self.added.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }

    fn remove(&mut self, path: &Path) -> Result<()> {
        self.removed.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }

    fn close(&mut self) {
        *self.tx.lock().unwrap() = None;
    }
}
