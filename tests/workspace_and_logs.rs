// tests/workspace_and_logs.rs

//! Workspace discovery and run-mode log sinks against the mock filesystem.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use watchbazel::command::{open_log_sink, RUN_LOG_DIR};
use watchbazel::fs::mock::MockFileSystem;
use watchbazel::fs::FileSystem;
use watchbazel::workspace::{MainWorkspaceFinder, WorkspaceFinder};

#[test]
fn finds_workspace_marker_in_an_ancestor() {
    let fs = MockFileSystem::new();
    fs.add_file("/repo/WORKSPACE", "");
    fs.add_file("/repo/pkg/deep/BUILD", "");

    let finder = MainWorkspaceFinder::starting_at(Arc::new(fs), "/repo/pkg/deep");
    assert_eq!(finder.find_workspace().unwrap(), PathBuf::from("/repo"));
}

#[test]
fn module_bazel_counts_as_a_marker() {
    let fs = MockFileSystem::new();
    fs.add_file("/repo/MODULE.bazel", "");

    let finder = MainWorkspaceFinder::starting_at(Arc::new(fs), "/repo/src");
    assert_eq!(finder.find_workspace().unwrap(), PathBuf::from("/repo"));
}

#[test]
fn missing_marker_is_an_error() {
    let fs = MockFileSystem::new();
    let finder = MainWorkspaceFinder::starting_at(Arc::new(fs), "/nowhere");
    assert!(finder.find_workspace().is_err());
}

#[test]
fn log_sink_filename_strips_label_punctuation() {
    let fs = MockFileSystem::new();
    let fs_probe = fs.clone();
    let fs: Arc<dyn FileSystem> = Arc::new(fs);

    let sink = open_log_sink(&fs, "//my/app:server").expect("sink opens");
    writeln!(sink.lock().unwrap(), "hello").unwrap();

    let expected = Path::new(RUN_LOG_DIR).join("myappserver.log");
    let contents = fs_probe.contents(&expected).expect("log file exists");
    assert_eq!(String::from_utf8(contents).unwrap(), "hello\n");
}
