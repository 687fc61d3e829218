// tests/engine_state_machine.rs

//! Walks of the single-target state graph with every collaborator faked.
//!
//! These tests drive `Engine::iterate` step by step, the same way a user
//! session unfolds: query, run, wait, edit, debounce, run again. Time is
//! paused, so debounce expiry is deterministic.

use std::path::{Path, PathBuf};
use std::time::Duration;

use watchbazel::engine::State;
use watchbazel::types::Verb;
use watchbazel::watch::{build_query, source_query, WatchEvent, WatchOp};

use watchbazel_test_utils::builders::source_file_query_result;
use watchbazel_test_utils::harness::{engine_harness, EngineHarness};
use watchbazel_test_utils::{init_tracing, with_timeout};

const TARGET: &str = "//path/to:target";

fn event(path: &str, op: WatchOp) -> WatchEvent {
    WatchEvent {
        path: PathBuf::from(path),
        op,
    }
}

/// Harness with the canonical single-target query responses installed:
/// one source file `/ws/path/to/foo`, one build file `/ws/path/to/BUILD`.
fn single_target_harness() -> EngineHarness {
    let h = engine_harness("/ws");
    h.bazel.add_query_response(
        &source_query(TARGET),
        source_file_query_result(&["//path/to:foo"]),
    );
    h.bazel.add_query_response(
        &build_query(TARGET),
        source_file_query_result(&["//path/to:BUILD"]),
    );
    h.fs.add_file("/ws/path/to/foo", "fn main() {}");
    h.fs.add_file("/ws/path/to/BUILD", "rule()");
    h
}

#[tokio::test(start_paused = true)]
async fn normal_edit_runs_the_command_twice() {
    init_tracing();
    let mut h = single_target_harness();
    h.engine
        .begin(Verb::Build, vec![TARGET.to_string()], Vec::new());

    assert_eq!(h.engine.state(), State::Query);
    with_timeout(h.engine.iterate()).await;
    assert_eq!(h.engine.state(), State::Run);

    // The reconciled sets reflect the query results, and the watcher was
    // pointed at the parent directory.
    assert!(h
        .engine
        .source_watch_set()
        .contains(Path::new("/ws/path/to/foo")));
    assert!(h
        .engine
        .build_watch_set()
        .contains(Path::new("/ws/path/to/BUILD")));
    assert_eq!(h.source_watcher.added(), vec![PathBuf::from("/ws/path/to")]);

    with_timeout(h.engine.iterate()).await;
    assert_eq!(h.engine.state(), State::Wait);
    assert_eq!(h.bazel.actions_of("Build").len(), 1);

    // Source edit: debounce, then a second run.
    h.source_tx
        .send(event("/ws/path/to/foo", WatchOp::Write))
        .unwrap();
    with_timeout(h.engine.iterate()).await;
    assert_eq!(h.engine.state(), State::DebounceRun);

    with_timeout(h.engine.iterate()).await;
    assert_eq!(h.engine.state(), State::Run);

    with_timeout(h.engine.iterate()).await;
    assert_eq!(h.engine.state(), State::Wait);
    assert_eq!(h.bazel.actions_of("Build").len(), 2);

    // Exactly one before/after pair per RUN entry, in order.
    let before = h.listener.events_with_prefix("before_command");
    let after = h.listener.events_with_prefix("after_command");
    assert_eq!(before.len(), 2);
    assert_eq!(after.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn graph_edit_requeries_before_running() {
    init_tracing();
    let mut h = single_target_harness();
    h.engine
        .begin(Verb::Build, vec![TARGET.to_string()], Vec::new());

    with_timeout(h.engine.iterate()).await; // QUERY -> RUN
    with_timeout(h.engine.iterate()).await; // RUN -> WAIT
    let queries_after_first_pass = h.bazel.actions_of("Query").len();
    assert_eq!(queries_after_first_pass, 2);

    h.build_tx
        .send(event("/ws/path/to/BUILD", WatchOp::Write))
        .unwrap();
    with_timeout(h.engine.iterate()).await;
    assert_eq!(h.engine.state(), State::DebounceQuery);

    with_timeout(h.engine.iterate()).await;
    assert_eq!(h.engine.state(), State::Query);

    with_timeout(h.engine.iterate()).await;
    assert_eq!(h.engine.state(), State::Run);
    assert_eq!(h.bazel.actions_of("Query").len(), queries_after_first_pass + 2);

    with_timeout(h.engine.iterate()).await;
    assert_eq!(h.engine.state(), State::Wait);
    assert_eq!(h.bazel.actions_of("Build").len(), 2);

    let changes = h.listener.events_with_prefix("change_detected graph");
    assert_eq!(changes.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn burst_of_edits_coalesces_into_one_run() {
    init_tracing();
    let mut h = single_target_harness();
    h.engine
        .begin(Verb::Build, vec![TARGET.to_string()], Vec::new());

    with_timeout(h.engine.iterate()).await; // QUERY -> RUN
    with_timeout(h.engine.iterate()).await; // RUN -> WAIT
    assert_eq!(h.bazel.actions_of("Build").len(), 1);

    // Three writes spaced inside the quiet period.
    h.source_tx
        .send(event("/ws/path/to/foo", WatchOp::Write))
        .unwrap();
    with_timeout(h.engine.iterate()).await;
    assert_eq!(h.engine.state(), State::DebounceRun);

    for _ in 0..2 {
        tokio::time::advance(Duration::from_millis(30)).await;
        h.source_tx
            .send(event("/ws/path/to/foo", WatchOp::Write))
            .unwrap();
        with_timeout(h.engine.iterate()).await;
        assert_eq!(h.engine.state(), State::DebounceRun);
    }

    // Quiet period elapses only now.
    with_timeout(h.engine.iterate()).await;
    assert_eq!(h.engine.state(), State::Run);
    with_timeout(h.engine.iterate()).await;
    assert_eq!(h.engine.state(), State::Wait);

    // One run for the whole burst.
    assert_eq!(h.bazel.actions_of("Build").len(), 2);
    assert_eq!(h.listener.events_with_prefix("change_detected").len(), 3);
}

#[tokio::test(start_paused = true)]
async fn unwatched_file_is_ignored() {
    init_tracing();
    let mut h = single_target_harness();
    h.engine
        .begin(Verb::Build, vec![TARGET.to_string()], Vec::new());

    with_timeout(h.engine.iterate()).await;
    with_timeout(h.engine.iterate()).await;
    assert_eq!(h.engine.state(), State::Wait);

    h.source_tx.send(event("/ws/b", WatchOp::Write)).unwrap();
    with_timeout(h.engine.iterate()).await;

    assert_eq!(h.engine.state(), State::Wait);
    assert!(h.listener.events_with_prefix("change_detected").is_empty());
}

#[tokio::test(start_paused = true)]
async fn non_modifying_op_is_ignored() {
    init_tracing();
    let mut h = single_target_harness();
    h.engine
        .begin(Verb::Build, vec![TARGET.to_string()], Vec::new());

    with_timeout(h.engine.iterate()).await;
    with_timeout(h.engine.iterate()).await;
    assert_eq!(h.engine.state(), State::Wait);

    // Chmod on a watched build file: delivered, but not modifying.
    h.build_tx
        .send(event("/ws/path/to/BUILD", WatchOp::Chmod))
        .unwrap();
    with_timeout(h.engine.iterate()).await;

    assert_eq!(h.engine.state(), State::Wait);
    assert!(h.listener.events_with_prefix("change_detected").is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_verb_drives_bazel_test() {
    init_tracing();
    let mut h = single_target_harness();
    h.engine
        .begin(Verb::Test, vec![TARGET.to_string()], Vec::new());

    with_timeout(h.engine.iterate()).await;
    with_timeout(h.engine.iterate()).await;

    assert_eq!(h.bazel.actions_of("Test").len(), 1);
    assert!(h.bazel.actions_of("Build").is_empty());

    // The client is prepared the same way for every command dispatch.
    let actions = h.bazel.actions();
    let test_pos = actions
        .iter()
        .position(|a| a[0] == "Test")
        .expect("test action recorded");
    assert_eq!(actions[test_pos - 3][0], "Cancel");
    assert_eq!(actions[test_pos - 2][0], "WriteToStderr");
    assert_eq!(actions[test_pos - 1][0], "WriteToStdout");
}

#[tokio::test(start_paused = true)]
async fn closed_event_stream_quits_the_loop() {
    init_tracing();
    let mut h = single_target_harness();
    h.engine
        .begin(Verb::Build, vec![TARGET.to_string()], Vec::new());

    with_timeout(h.engine.iterate()).await;
    with_timeout(h.engine.iterate()).await;
    assert_eq!(h.engine.state(), State::Wait);

    // Close the source watcher and drop the test's sender: the stream ends.
    h.source_watcher.close_now();
    drop(h.source_tx);

    with_timeout(h.engine.iterate()).await;
    assert_eq!(h.engine.state(), State::Quit);

    h.engine.cleanup();
    assert_eq!(h.listener.events_with_prefix("cleanup").len(), 1);
    assert!(h.build_watcher.is_closed());
}

#[tokio::test(start_paused = true)]
async fn command_failure_stays_in_the_loop() {
    init_tracing();
    let mut h = single_target_harness();
    h.bazel.set_build_error(true);
    h.engine
        .begin(Verb::Build, vec![TARGET.to_string()], Vec::new());

    with_timeout(h.engine.iterate()).await;
    with_timeout(h.engine.iterate()).await;

    assert_eq!(h.engine.state(), State::Wait);
    let after = h.listener.events_with_prefix("after_command");
    assert_eq!(after.len(), 1);
    assert!(after[0].contains("success=false"), "got: {}", after[0]);
}
