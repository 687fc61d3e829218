// tests/engine_multi_target.rs

//! Multi-target run mode: per-target queries, the directory map, and
//! incremental rebuild/requery scoping after the first full build.

use std::path::{Path, PathBuf};

use watchbazel::engine::State;
use watchbazel::types::Verb;
use watchbazel::watch::{build_query, source_query, WatchEvent, WatchOp};

use watchbazel_test_utils::builders::{rule_cquery_result, source_file_query_result};
use watchbazel_test_utils::harness::{engine_harness, EngineHarness};
use watchbazel_test_utils::{init_tracing, with_timeout};

const TARGET_A: &str = "//a:one";
const TARGET_B: &str = "//b:two";

fn write(path: &str) -> WatchEvent {
    WatchEvent {
        path: PathBuf::from(path),
        op: WatchOp::Write,
    }
}

fn two_target_harness() -> EngineHarness {
    let h = engine_harness("/ws");
    h.bazel.add_query_response(
        &source_query(TARGET_A),
        source_file_query_result(&["//a:src1"]),
    );
    h.bazel.add_query_response(
        &source_query(TARGET_B),
        source_file_query_result(&["//b:src2"]),
    );
    h.bazel
        .add_query_response(&build_query(TARGET_A), source_file_query_result(&["//a:BUILD"]));
    h.bazel
        .add_query_response(&build_query(TARGET_B), source_file_query_result(&["//b:BUILD"]));
    h.bazel
        .add_cquery_response(TARGET_A, rule_cquery_result(TARGET_A, &[]));
    h.bazel
        .add_cquery_response(TARGET_B, rule_cquery_result(TARGET_B, &[]));
    for file in ["/ws/a/src1", "/ws/a/BUILD", "/ws/b/src2", "/ws/b/BUILD"] {
        h.fs.add_file(file, "x");
    }
    h
}

/// Drive the first QUERY and RUN so both subprocesses are up.
async fn first_pass(h: &mut EngineHarness) {
    h.engine.begin(
        Verb::Run,
        vec![TARGET_A.to_string(), TARGET_B.to_string()],
        Vec::new(),
    );
    with_timeout(h.engine.iterate()).await; // QUERY -> RUN
    with_timeout(h.engine.iterate()).await; // RUN -> WAIT
    assert_eq!(h.engine.state(), State::Wait);
}

#[tokio::test(start_paused = true)]
async fn first_run_builds_everything_and_starts_each_target() {
    init_tracing();
    let mut h = two_target_harness();
    first_pass(&mut h).await;

    // One full build over both targets.
    let builds = h.bazel.actions_of("Build");
    assert_eq!(builds, vec![vec![
        "Build".to_string(),
        TARGET_A.to_string(),
        TARGET_B.to_string(),
    ]]);

    // Both rules queried, both handles created and started exactly once.
    assert_eq!(h.bazel.actions_of("CQuery").len(), 2);
    assert_eq!(h.default_cmds.created_count(), 2);
    for target in [TARGET_A, TARGET_B] {
        let cmd = h.default_cmds.get(target).expect("command created");
        assert_eq!(cmd.state().start_calls, 1);
        assert_eq!(cmd.state().notify_calls, 0);
    }

    // Watch sets union both targets' files.
    assert!(h.engine.source_watch_set().contains(Path::new("/ws/a/src1")));
    assert!(h.engine.source_watch_set().contains(Path::new("/ws/b/src2")));
    assert!(h.engine.build_dir_map().contains_dir(Path::new("/ws/a")));
    assert!(h.engine.build_dir_map().contains_dir(Path::new("/ws/b")));
}

#[tokio::test(start_paused = true)]
async fn source_edit_rebuilds_only_the_affected_target() {
    init_tracing();
    let mut h = two_target_harness();
    first_pass(&mut h).await;

    h.source_tx.send(write("/ws/a/src1")).unwrap();
    with_timeout(h.engine.iterate()).await; // WAIT -> DEBOUNCE_RUN
    with_timeout(h.engine.iterate()).await; // debounce -> RUN
    with_timeout(h.engine.iterate()).await; // RUN -> WAIT

    // The second build covers only the target behind the changed directory.
    let builds = h.bazel.actions_of("Build");
    assert_eq!(builds.len(), 2);
    assert_eq!(builds[1], vec!["Build".to_string(), TARGET_A.to_string()]);

    // Only that target's subprocess is notified.
    assert_eq!(h.default_cmds.get(TARGET_A).unwrap().state().notify_calls, 1);
    assert_eq!(h.default_cmds.get(TARGET_B).unwrap().state().notify_calls, 0);

    // Every existing handle saw the rebuild coming.
    assert_eq!(
        h.default_cmds.get(TARGET_B).unwrap().state().before_rebuild_calls,
        1
    );
}

#[tokio::test(start_paused = true)]
async fn graph_edit_requeries_only_the_affected_target() {
    init_tracing();
    let mut h = two_target_harness();
    first_pass(&mut h).await;
    let queries_before = h.bazel.actions_of("Query").len();

    h.build_tx.send(write("/ws/a/BUILD")).unwrap();
    with_timeout(h.engine.iterate()).await; // WAIT -> DEBOUNCE_QUERY
    with_timeout(h.engine.iterate()).await; // debounce -> QUERY
    with_timeout(h.engine.iterate()).await; // QUERY -> RUN

    // Exactly two new queries, both scoped to the affected target.
    let queries = h.bazel.actions_of("Query");
    assert_eq!(queries.len(), queries_before + 2);
    assert_eq!(queries[queries_before][1], build_query(TARGET_A));
    assert_eq!(queries[queries_before + 1][1], source_query(TARGET_A));

    // The other target's directories and files stay watched.
    assert!(h.engine.build_dir_map().contains_dir(Path::new("/ws/b")));
    assert!(h.engine.build_watch_set().contains(Path::new("/ws/b/BUILD")));
    assert!(h.engine.source_watch_set().contains(Path::new("/ws/b/src2")));
}

#[tokio::test(start_paused = true)]
async fn failed_build_skips_notifications() {
    init_tracing();
    let mut h = two_target_harness();
    first_pass(&mut h).await;

    h.bazel.set_build_error(true);
    h.source_tx.send(write("/ws/a/src1")).unwrap();
    with_timeout(h.engine.iterate()).await;
    with_timeout(h.engine.iterate()).await;
    with_timeout(h.engine.iterate()).await;

    assert_eq!(h.engine.state(), State::Wait);
    assert_eq!(h.default_cmds.get(TARGET_A).unwrap().state().notify_calls, 0);

    // The failure is still fanned out to listeners.
    let failed: Vec<String> = h
        .listener
        .events_with_prefix("after_command")
        .into_iter()
        .filter(|e| e.contains("success=false"))
        .collect();
    assert!(!failed.is_empty());
}
