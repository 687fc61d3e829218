// src/watch/watchset.rs

//! Watch-set bookkeeping and reconciliation planning.
//!
//! The authoritative state per watcher is a set of files. Directories, not
//! files, are what the watcher facade observes; a file is in the watch set iff
//! its parent directory was successfully added. Planning is pure so the
//! algorithm can be tested without a watcher; applying a plan (and thereby
//! learning which adds succeeded) happens in [`super::reconcile`].

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::fs::FileSystem;

/// Files currently watched on behalf of one watcher.
pub type WatchSet = HashSet<PathBuf>;

/// One directory to add, with the files inside it the engine cares about.
#[derive(Debug, Clone)]
pub struct DirAdd {
    pub dir: PathBuf,
    pub files: Vec<PathBuf>,
}

/// Planned watcher mutations for one reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct ReconcilePlan {
    /// Directories to add, in first-seen order of the query result.
    pub add_dirs: Vec<DirAdd>,
    /// Stale parent directories to remove, deduplicated.
    pub remove_dirs: Vec<PathBuf>,
    /// Previously-watched files to retain although this pass did not desire
    /// them (multi-target incremental queries cover only some targets).
    pub keep: Vec<PathBuf>,
    /// How many desired files exist on disk; zero warrants a warning.
    pub found: usize,
}

/// Compute the watcher mutations that take `current` to the watch set implied
/// by `desired`.
///
/// In multi-target mode `keep_dirs` holds the directories any current target
/// still needs; files and directories it covers survive even when an
/// incremental pass did not re-derive them.
pub fn plan(
    current: &WatchSet,
    desired: &[PathBuf],
    keep_dirs: Option<&TargetDirMap>,
    fs: &Arc<dyn FileSystem>,
) -> ReconcilePlan {
    let mut order: Vec<PathBuf> = Vec::new();
    let mut by_dir: HashMap<PathBuf, Vec<PathBuf>> = HashMap::new();
    let mut found = 0;

    for file in desired {
        if fs.exists(file) {
            found += 1;
        }
        let Some(parent) = file.parent() else { continue };
        if !by_dir.contains_key(parent) {
            order.push(parent.to_path_buf());
        }
        by_dir
            .entry(parent.to_path_buf())
            .or_default()
            .push(file.clone());
    }

    let desired_set: HashSet<&PathBuf> = desired.iter().collect();
    let mut removed: HashSet<PathBuf> = HashSet::new();
    let mut remove_dirs = Vec::new();
    let mut keep = Vec::new();

    for file in current {
        let Some(parent) = file.parent() else { continue };
        let readded = by_dir.contains_key(parent);
        let retained = keep_dirs.is_some_and(|m| m.contains_dir(parent));

        if !readded && !retained {
            if removed.insert(parent.to_path_buf()) {
                remove_dirs.push(parent.to_path_buf());
            }
        } else if retained && !desired_set.contains(file) {
            keep.push(file.clone());
        }
    }

    let add_dirs = order
        .into_iter()
        .map(|dir| {
            let files = by_dir.remove(&dir).unwrap_or_default();
            DirAdd { dir, files }
        })
        .collect();

    ReconcilePlan {
        add_dirs,
        remove_dirs,
        keep,
        found,
    }
}

/// Directories watched per target, with the ordered list of targets that
/// caused each directory to be watched.
///
/// A directory stays in the map as long as at least one current target needs
/// it. The map is what scopes incremental re-queries: a change under
/// directory `d` only re-derives the targets listed for `d`.
#[derive(Debug, Clone, Default)]
pub struct TargetDirMap {
    dirs: HashMap<PathBuf, Vec<String>>,
}

impl TargetDirMap {
    /// Targets associated with a directory, empty if the directory is
    /// unknown.
    pub fn targets_for(&self, dir: &Path) -> Vec<String> {
        self.dirs.get(dir).cloned().unwrap_or_default()
    }

    pub fn contains_dir(&self, dir: &Path) -> bool {
        self.dirs.contains_key(dir)
    }

    /// Remove the given targets from every directory's list, dropping
    /// directories whose list becomes empty.
    pub fn prune_targets(&mut self, targets: &[String]) {
        self.dirs.retain(|_, list| {
            list.retain(|t| !targets.contains(t));
            !list.is_empty()
        });
    }

    /// Associate each file's parent directory with `target`, preserving
    /// first-association order and skipping duplicates.
    pub fn record(&mut self, target: &str, files: &[PathBuf]) {
        for file in files {
            let Some(parent) = file.parent() else { continue };
            let list = self.dirs.entry(parent.to_path_buf()).or_default();
            if !list.iter().any(|t| t == target) {
                list.push(target.to_string());
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    /// All directories currently in the map.
    pub fn dirs(&self) -> impl Iterator<Item = &Path> {
        self.dirs.keys().map(PathBuf::as_path)
    }
}
