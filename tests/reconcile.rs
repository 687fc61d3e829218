// tests/reconcile.rs

//! Reconciliation: plan shape, fail-soft behaviour, directory bookkeeping,
//! and label handling.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use watchbazel::bazel::{label_to_path, parse_target};
use watchbazel::fs::mock::MockFileSystem;
use watchbazel::fs::FileSystem;
use watchbazel::watch::watchset::{plan, TargetDirMap, WatchSet};
use watchbazel::watch::{apply_plan, source_query, Reconciler};
use watchbazel_test_utils::builders::source_file_query_result;
use watchbazel_test_utils::fake_bazel::FakeBazel;
use watchbazel_test_utils::fake_watcher::FakeWatcher;
use watchbazel_test_utils::fake_workspace::FakeWorkspaceFinder;
use watchbazel_test_utils::init_tracing;

fn paths(items: &[&str]) -> Vec<PathBuf> {
    items.iter().map(PathBuf::from).collect()
}

fn mock_fs_with(files: &[&str]) -> Arc<dyn FileSystem> {
    let fs = MockFileSystem::new();
    for file in files {
        fs.add_file(file, "x");
    }
    Arc::new(fs)
}

#[test]
fn plan_groups_files_by_parent_in_first_seen_order() {
    let fs = mock_fs_with(&["/ws/a/one", "/ws/b/two", "/ws/a/three"]);
    let desired = paths(&["/ws/a/one", "/ws/b/two", "/ws/a/three"]);

    let plan = plan(&WatchSet::new(), &desired, None, &fs);

    let dirs: Vec<&Path> = plan.add_dirs.iter().map(|d| d.dir.as_path()).collect();
    assert_eq!(dirs, vec![Path::new("/ws/a"), Path::new("/ws/b")]);
    assert_eq!(plan.add_dirs[0].files, paths(&["/ws/a/one", "/ws/a/three"]));
    assert_eq!(plan.found, 3);
    assert!(plan.remove_dirs.is_empty());
}

#[test]
fn plan_removes_a_stale_parent_once() {
    let fs = mock_fs_with(&["/ws/new/file"]);
    let current: WatchSet = paths(&["/ws/old/one", "/ws/old/two"]).into_iter().collect();
    let desired = paths(&["/ws/new/file"]);

    let plan = plan(&current, &desired, None, &fs);

    assert_eq!(plan.remove_dirs, paths(&["/ws/old"]));
    assert!(plan.keep.is_empty());
}

#[test]
fn plan_retains_directories_other_targets_still_need() {
    let fs = mock_fs_with(&["/ws/a/one"]);
    let current: WatchSet = paths(&["/ws/a/one", "/ws/b/two"]).into_iter().collect();
    // Only target A was re-queried; B still owns /ws/b.
    let mut dirs = TargetDirMap::default();
    dirs.record("//b:two", &paths(&["/ws/b/two"]));
    dirs.record("//a:one", &paths(&["/ws/a/one"]));

    let plan = plan(&current, &paths(&["/ws/a/one"]), Some(&dirs), &fs);

    assert!(plan.remove_dirs.is_empty());
    assert_eq!(plan.keep, paths(&["/ws/b/two"]));
}

#[test]
fn apply_drops_files_whose_directory_add_fails() {
    init_tracing();
    let fs = mock_fs_with(&["/ws/ok/file", "/ws/bad/file"]);
    let (mut watcher, _rx, _tx) = FakeWatcher::new();
    watcher.fail_add_for("/ws/bad");

    let plan = plan(
        &WatchSet::new(),
        &paths(&["/ws/ok/file", "/ws/bad/file"]),
        None,
        &fs,
    );
    let next = apply_plan(&mut watcher, plan);

    assert!(next.contains(Path::new("/ws/ok/file")));
    assert!(!next.contains(Path::new("/ws/bad/file")));
    assert_eq!(watcher.added(), paths(&["/ws/ok"]));
}

#[tokio::test]
async fn reconciling_twice_with_identical_results_changes_nothing() {
    init_tracing();
    let bazel = FakeBazel::new();
    let expr = source_query("//a:lib");
    bazel.add_query_response(&expr, source_file_query_result(&["//a:one", "//a:two"]));

    let fs = MockFileSystem::new();
    fs.add_file("/ws/a/one", "x");
    fs.add_file("/ws/a/two", "x");
    let reconciler = Reconciler::new(
        Arc::new(FakeWorkspaceFinder::new("/ws")),
        Arc::new(fs),
    );
    let (mut watcher, _rx, _tx) = FakeWatcher::new();

    let mut client = bazel.factory()();
    let first = reconciler
        .reconcile(client.as_mut(), &expr, &mut watcher, &WatchSet::new())
        .await;
    let second = reconciler
        .reconcile(client.as_mut(), &expr, &mut watcher, &first)
        .await;

    assert_eq!(first, second);
    assert!(watcher.removed().is_empty());
    // Adds are idempotent: the same directory is (re)added per pass.
    assert_eq!(watcher.added(), paths(&["/ws/a", "/ws/a"]));
}

#[tokio::test]
async fn query_failure_keeps_the_previous_watch_set() {
    init_tracing();
    let bazel = FakeBazel::new();
    let expr = source_query("//a:lib");
    bazel.add_query_response(&expr, source_file_query_result(&["//a:one"]));

    let fs = MockFileSystem::new();
    fs.add_file("/ws/a/one", "x");
    let reconciler = Reconciler::new(
        Arc::new(FakeWorkspaceFinder::new("/ws")),
        Arc::new(fs),
    );
    let (mut watcher, _rx, _tx) = FakeWatcher::new();

    let mut client = bazel.factory()();
    let first = reconciler
        .reconcile(client.as_mut(), &expr, &mut watcher, &WatchSet::new())
        .await;
    assert!(first.contains(Path::new("/ws/a/one")));

    bazel.set_query_error(true);
    let adds_before = watcher.added().len();
    let second = reconciler
        .reconcile(client.as_mut(), &expr, &mut watcher, &first)
        .await;

    assert_eq!(first, second);
    assert_eq!(watcher.added().len(), adds_before);
    assert!(watcher.removed().is_empty());
}

#[tokio::test]
async fn external_labels_are_not_watched() {
    init_tracing();
    let bazel = FakeBazel::new();
    let expr = source_query("//a:lib");
    bazel.add_query_response(
        &expr,
        source_file_query_result(&["//a:one", "@repo//b:two", "//external/c:three"]),
    );

    let fs = MockFileSystem::new();
    fs.add_file("/ws/a/one", "x");
    let reconciler = Reconciler::new(
        Arc::new(FakeWorkspaceFinder::new("/ws")),
        Arc::new(fs),
    );
    let (mut watcher, _rx, _tx) = FakeWatcher::new();

    let mut client = bazel.factory()();
    let set = reconciler
        .reconcile(client.as_mut(), &expr, &mut watcher, &WatchSet::new())
        .await;

    assert_eq!(set.len(), 1);
    assert!(set.contains(Path::new("/ws/a/one")));
}

#[test]
fn target_dir_map_prunes_empty_directories() {
    let mut dirs = TargetDirMap::default();
    dirs.record("//a:one", &paths(&["/ws/shared/f1", "/ws/a/f2"]));
    dirs.record("//b:two", &paths(&["/ws/shared/f3"]));

    assert_eq!(
        dirs.targets_for(Path::new("/ws/shared")),
        vec!["//a:one".to_string(), "//b:two".to_string()]
    );

    dirs.prune_targets(&["//a:one".to_string()]);

    // The shared directory survives through B; A's private directory is gone.
    assert_eq!(
        dirs.targets_for(Path::new("/ws/shared")),
        vec!["//b:two".to_string()]
    );
    assert!(!dirs.contains_dir(Path::new("/ws/a")));
}

#[test]
fn label_rewriting() {
    let ws = Path::new("/ws");
    assert_eq!(
        label_to_path(ws, "//path/to:foo"),
        Some(PathBuf::from("/ws/path/to/foo"))
    );
    assert_eq!(label_to_path(ws, "@repo//path:foo"), None);
    assert_eq!(label_to_path(ws, "//external/repo:foo"), None);
}

#[test]
fn target_parsing_round_trip() {
    assert_eq!(parse_target("@//my:target"), Some(("", "my:target")));
    assert_eq!(parse_target("@repo//my:target"), Some(("repo", "my:target")));
    assert_eq!(
        parse_target("@bazel_tools//:strange/target"),
        Some(("bazel_tools", ":strange/target"))
    );
}
