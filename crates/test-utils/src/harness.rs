use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use watchbazel::command::ProcessRegistry;
use watchbazel::engine::{Engine, EngineDeps, EngineOptions, Sig};
use watchbazel::fs::mock::MockFileSystem;
use watchbazel::watch::WatchEvent;

use crate::fake_bazel::FakeBazel;
use crate::fake_command::FakeCommandFactory;
use crate::fake_watcher::FakeWatcher;
use crate::fake_workspace::FakeWorkspaceFinder;
use crate::recording::RecordingListener;

/// An engine wired entirely to fakes, plus probes into all of them.
///
/// Must be constructed inside a tokio runtime (the engine spawns its
/// source-event forwarder on creation).
pub struct EngineHarness {
    pub engine: Engine,
    pub bazel: FakeBazel,
    pub fs: MockFileSystem,
    pub source_watcher: FakeWatcher,
    pub build_watcher: FakeWatcher,
    pub source_tx: mpsc::UnboundedSender<WatchEvent>,
    pub build_tx: mpsc::UnboundedSender<WatchEvent>,
    pub listener: RecordingListener,
    pub default_cmds: FakeCommandFactory,
    pub notify_cmds: FakeCommandFactory,
    pub registry: ProcessRegistry,
    pub sig_rx: mpsc::Receiver<Sig>,
}

/// Build an [`EngineHarness`] rooted at the given fake workspace.
pub fn engine_harness(workspace_root: &str) -> EngineHarness {
    let bazel = FakeBazel::new();
    let fs = MockFileSystem::new();
    let (source_watcher, source_events, source_tx) = FakeWatcher::new();
    let (build_watcher, build_events, build_tx) = FakeWatcher::new();
    let listener = RecordingListener::new();
    let default_cmds = FakeCommandFactory::new();
    let notify_cmds = FakeCommandFactory::new();
    let registry = ProcessRegistry::default();
    let (sig_tx, sig_rx) = mpsc::channel::<Sig>(4);

    let deps = EngineDeps {
        bazel_factory: bazel.factory(),
        default_command: default_cmds.factory(),
        notify_command: notify_cmds.factory(),
        fs: Arc::new(fs.clone()),
        workspace: Arc::new(FakeWorkspaceFinder::new(workspace_root)),
        source_watcher: Box::new(source_watcher.clone()),
        source_events,
        build_watcher: Box::new(build_watcher.clone()),
        build_events,
        listeners: vec![Box::new(listener.clone())],
        registry: registry.clone(),
        sig_tx,
    };

    let opts = EngineOptions {
        debounce: Duration::from_millis(100),
        run_log_to_files: false,
        teardown_grace: Duration::from_millis(10),
    };

    EngineHarness {
        engine: Engine::new(deps, opts),
        bazel,
        fs,
        source_watcher,
        build_watcher,
        source_tx,
        build_tx,
        listener,
        default_cmds,
        notify_cmds,
        registry,
        sig_rx,
    }
}
