// src/watch/reconcile.rs

//! Query-driven reconciliation of the watched file sets.
//!
//! Two queries derive what to watch from the target set:
//! - sources: `kind('source file', deps(set(T)))`
//! - build files: `buildfiles(deps(set(T)))`
//!
//! Query results are labels; labels become workspace paths; paths become
//! directory watches plus a watch set. If a query fails the previous watch
//! set stays in force.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, warn};

use crate::bazel::query::SOURCE_FILE_KIND;
use crate::bazel::{label_to_path, Bazel};
use crate::errors::Result;
use crate::fs::FileSystem;
use crate::watch::watchset::{self, DirAdd, ReconcilePlan, TargetDirMap, WatchSet};
use crate::watch::FileWatcher;
use crate::workspace::WorkspaceFinder;

/// Query deriving the source files a target set depends on.
pub fn source_query(targets: &str) -> String {
    format!("kind('source file', deps(set({targets})))")
}

/// Query deriving the build-description files a target set depends on.
pub fn build_query(targets: &str) -> String {
    format!("buildfiles(deps(set({targets})))")
}

pub struct Reconciler {
    workspace: Arc<dyn WorkspaceFinder>,
    fs: Arc<dyn FileSystem>,
}

impl Reconciler {
    pub fn new(workspace: Arc<dyn WorkspaceFinder>, fs: Arc<dyn FileSystem>) -> Self {
        Self { workspace, fs }
    }

    /// Run a file query and rewrite the resulting labels into absolute paths.
    ///
    /// External-repository labels are skipped; they live outside the
    /// workspace and cannot be watched.
    async fn query_files(&self, bazel: &mut dyn Bazel, expr: &str) -> Result<Vec<PathBuf>> {
        let result = bazel.query(expr).await?;
        let workspace_root = self.workspace.find_workspace()?;

        let mut to_watch = Vec::new();
        for target in &result.targets {
            if target.kind != SOURCE_FILE_KIND {
                warn!(kind = %target.kind, "unexpected target kind in file query");
                continue;
            }
            let Some(source) = &target.source_file else {
                continue;
            };
            if let Some(path) = label_to_path(&workspace_root, &source.name) {
                to_watch.push(path);
            }
        }
        Ok(to_watch)
    }

    /// Reconcile one watcher against a single query over the whole target
    /// set. Returns the new authoritative watch set.
    pub async fn reconcile(
        &self,
        bazel: &mut dyn Bazel,
        expr: &str,
        watcher: &mut dyn FileWatcher,
        current: &WatchSet,
    ) -> WatchSet {
        let to_watch = match self.query_files(bazel, expr).await {
            Ok(files) => files,
            Err(err) => {
                error!(query = %expr, error = %err, "query failed; keeping previous watch set");
                return current.clone();
            }
        };

        let plan = watchset::plan(current, &to_watch, None, &self.fs);
        if plan.found == 0 {
            warn!(query = %expr, "didn't find any files to watch from query");
        }
        apply_plan(watcher, plan)
    }

    /// Reconcile one watcher against per-target queries, maintaining the
    /// directory map that scopes later incremental passes.
    ///
    /// `targets` may be a subset of all driven targets; directories (and
    /// files) belonging to targets outside the subset survive via the map.
    pub async fn reconcile_targets(
        &self,
        bazel: &mut dyn Bazel,
        query: fn(&str) -> String,
        targets: &[String],
        watcher: &mut dyn FileWatcher,
        current: &WatchSet,
        dirs: &mut TargetDirMap,
    ) -> WatchSet {
        let mut by_target: Vec<(&String, Vec<PathBuf>)> = Vec::new();
        for target in targets {
            let expr = query(target);
            match self.query_files(bazel, &expr).await {
                Ok(files) => by_target.push((target, files)),
                Err(err) => {
                    error!(
                        target = %target,
                        query = %expr,
                        error = %err,
                        "query failed; keeping previous watch set"
                    );
                    return current.clone();
                }
            }
        }

        dirs.prune_targets(targets);
        let mut desired = Vec::new();
        for (target, files) in &by_target {
            dirs.record(target.as_str(), files);
            desired.extend(files.iter().cloned());
        }

        let plan = watchset::plan(current, &desired, Some(dirs), &self.fs);
        if plan.found == 0 {
            warn!(?targets, "didn't find any files to watch from queries");
        }
        apply_plan(watcher, plan)
    }
}

/// Execute a reconciliation plan against the watcher.
///
/// Files land in the new watch set only when their parent directory was
/// added successfully; add and remove failures are logged and skipped, with
/// one suppression: the defaults package of some bazel installations refuses
/// watches and is not worth reporting.
pub fn apply_plan(watcher: &mut dyn FileWatcher, plan: ReconcilePlan) -> WatchSet {
    let mut next: WatchSet = plan.keep.into_iter().collect();

    for DirAdd { dir, files } in plan.add_dirs {
        match watcher.add(&dir) {
            Ok(()) => next.extend(files),
            Err(err) => {
                for file in &files {
                    if !is_defaults_build(file) {
                        error!(file = ?file, error = %err, "error watching file");
                    }
                }
            }
        }
    }

    for dir in plan.remove_dirs {
        if let Err(err) = watcher.remove(&dir) {
            error!(dir = ?dir, error = %err, "error unwatching directory");
        }
    }

    next
}

fn is_defaults_build(path: &Path) -> bool {
    path.to_string_lossy()
        .replace('\\', "/")
        .ends_with("/tools/defaults/BUILD")
}
