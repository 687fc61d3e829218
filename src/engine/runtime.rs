// src/engine/runtime.rs

//! Async shell around the watch-loop state machine.
//!
//! The engine owns both watcher facades, the watch sets, the lifecycle
//! listener list, and (in run mode) the per-target subprocess handles. Each
//! call to [`Engine::iterate`] performs exactly one state's work: QUERY and
//! RUN are synchronous phases that complete before the loop resumes, while
//! WAIT and the two debounce states block on a multiplexed receive over the
//! event channels (plus the debounce deadline).

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::bazel::query::RULE_KIND;
use crate::bazel::{Bazel, BazelFactory, Rule};
use crate::command::{
    open_log_sink, Command, CommandFactory, CommandSpec, LogSink, ProcessRegistry,
    NOTIFY_CHANGES_TAG,
};
use crate::errors::{Result, WatchbazelError};
use crate::fs::FileSystem;
use crate::lifecycle::Lifecycle;
use crate::types::{OutputBuffer, Verb};
use crate::watch::events::{is_modifying, spawn_source_event_forwarder};
use crate::watch::{
    build_query, source_query, FileWatcher, Reconciler, TargetDirMap, WatchEvent, WatchSet,
};
use crate::workspace::WorkspaceFinder;

use super::core::EngineCore;
use super::signals::Sig;
use super::{ChangeKind, EngineOptions, State};

/// Collaborators injected at construction.
pub struct EngineDeps {
    pub bazel_factory: BazelFactory,
    pub default_command: CommandFactory,
    pub notify_command: CommandFactory,
    pub fs: Arc<dyn FileSystem>,
    pub workspace: Arc<dyn WorkspaceFinder>,
    pub source_watcher: Box<dyn FileWatcher>,
    pub source_events: mpsc::UnboundedReceiver<WatchEvent>,
    pub build_watcher: Box<dyn FileWatcher>,
    pub build_events: mpsc::UnboundedReceiver<WatchEvent>,
    pub listeners: Vec<Box<dyn Lifecycle>>,
    pub registry: ProcessRegistry,
    pub sig_tx: mpsc::Sender<Sig>,
}

pub struct Engine {
    core: EngineCore,
    opts: EngineOptions,

    verb: Verb,
    multi: bool,
    targets: Vec<String>,
    joined: String,
    extra_args: Vec<String>,
    startup_args: Vec<String>,
    bazel_args: Vec<String>,

    bazel_factory: BazelFactory,
    default_command: CommandFactory,
    notify_command: CommandFactory,
    fs: Arc<dyn FileSystem>,
    reconciler: Reconciler,

    source_watcher: Box<dyn FileWatcher>,
    build_watcher: Box<dyn FileWatcher>,
    source_events: mpsc::UnboundedReceiver<WatchEvent>,
    build_events: mpsc::UnboundedReceiver<WatchEvent>,
    source_watched: WatchSet,
    build_watched: WatchSet,
    src_dirs: TargetDirMap,
    bld_dirs: TargetDirMap,
    debounce_deadline: Option<Instant>,

    listeners: Vec<Box<dyn Lifecycle>>,
    registry: ProcessRegistry,
    cmds: HashMap<String, Box<dyn Command>>,
    log_sinks: HashMap<String, Option<LogSink>>,
    sig_tx: mpsc::Sender<Sig>,
}

impl Engine {
    pub fn new(deps: EngineDeps, opts: EngineOptions) -> Self {
        let reconciler = Reconciler::new(deps.workspace, deps.fs.clone());
        // Source events pass through the forwarder, which drops every
        // non-modifying op before the engine sees it.
        let source_events = spawn_source_event_forwarder(deps.source_events);

        Self {
            core: EngineCore::new(false),
            opts,
            verb: Verb::Build,
            multi: false,
            targets: Vec::new(),
            joined: String::new(),
            extra_args: Vec::new(),
            startup_args: Vec::new(),
            bazel_args: Vec::new(),
            bazel_factory: deps.bazel_factory,
            default_command: deps.default_command,
            notify_command: deps.notify_command,
            fs: deps.fs,
            reconciler,
            source_watcher: deps.source_watcher,
            build_watcher: deps.build_watcher,
            source_events,
            build_events: deps.build_events,
            source_watched: WatchSet::new(),
            build_watched: WatchSet::new(),
            src_dirs: TargetDirMap::default(),
            bld_dirs: TargetDirMap::default(),
            debounce_deadline: None,
            listeners: deps.listeners,
            registry: deps.registry,
            cmds: HashMap::new(),
            log_sinks: HashMap::new(),
            sig_tx: deps.sig_tx,
        }
    }

    pub fn set_startup_args(&mut self, args: Vec<String>) {
        self.startup_args = args;
    }

    pub fn set_bazel_args(&mut self, args: Vec<String>) {
        self.bazel_args = args;
    }

    /// Build the targets, rebuilding on every change. Runs until torn down by
    /// a signal.
    pub async fn build(mut self, targets: Vec<String>) -> Result<()> {
        self.begin(Verb::Build, targets, Vec::new());
        self.run_loop().await
    }

    /// Test the targets, retesting on every change.
    pub async fn test(mut self, targets: Vec<String>) -> Result<()> {
        self.begin(Verb::Test, targets, Vec::new());
        self.run_loop().await
    }

    /// Run the targets, restarting or notifying their subprocesses on every
    /// change. `args` are forwarded to each executed binary.
    pub async fn run(mut self, targets: Vec<String>, args: Vec<String>) -> Result<()> {
        self.begin(Verb::Run, targets, args);
        self.run_loop().await
    }

    /// Configure the loop without entering it. Tests drive [`Self::iterate`]
    /// directly from here.
    pub fn begin(&mut self, verb: Verb, targets: Vec<String>, extra_args: Vec<String>) {
        self.multi = verb == Verb::Run && targets.len() > 1;
        self.joined = targets.join(" ");
        self.verb = verb;
        self.targets = targets;
        self.extra_args = extra_args;
        self.core = EngineCore::new(self.multi);
    }

    /// Current engine state (for tests).
    pub fn state(&self) -> State {
        self.core.state()
    }

    /// Current source watch set (for tests).
    pub fn source_watch_set(&self) -> &WatchSet {
        &self.source_watched
    }

    /// Current build-file watch set (for tests).
    pub fn build_watch_set(&self) -> &WatchSet {
        &self.build_watched
    }

    /// Directory map backing incremental build-file queries (for tests).
    pub fn build_dir_map(&self) -> &TargetDirMap {
        &self.bld_dirs
    }

    pub async fn run_loop(&mut self) -> Result<()> {
        self.startup().await;
        while self.core.state() != State::Quit {
            self.iterate().await;
        }
        self.cleanup();
        Ok(())
    }

    /// Perform one state's worth of work.
    pub async fn iterate(&mut self) {
        match self.core.state() {
            State::Query => self.do_query().await,
            State::Run => self.do_run().await,
            State::Wait => self.do_wait().await,
            State::DebounceRun => self.do_debounce(ChangeKind::Source).await,
            State::DebounceQuery => self.do_debounce(ChangeKind::Graph).await,
            State::Quit => {}
        }
    }

    /// Close watchers, fan `cleanup` out to the listeners in list order, and
    /// close the run-log sinks.
    pub fn cleanup(&mut self) {
        self.source_watcher.close();
        self.build_watcher.close();
        for listener in &mut self.listeners {
            listener.cleanup();
        }
        self.log_sinks.clear();
    }

    async fn startup(&mut self) {
        let mut bazel = self.new_bazel();
        let info = match bazel.info().await {
            Ok(info) => info,
            Err(err) => {
                error!(error = %err, "error getting bazel info");
                HashMap::new()
            }
        };
        for listener in &mut self.listeners {
            listener.initialize(&info);
        }
    }

    fn new_bazel(&self) -> Box<dyn Bazel> {
        let mut bazel = (self.bazel_factory)();
        bazel.set_startup_args(self.startup_args.clone());
        bazel.set_arguments(self.bazel_args.clone());
        bazel
    }

    async fn do_query(&mut self) {
        if self.multi {
            // A change under a known directory only re-derives the targets
            // that caused the directory to be watched; anything else (a new
            // file, first pass) re-queries everything.
            let to_query = match self.core.take_prev_dir() {
                Some(dir) => {
                    let scoped = self.bld_dirs.targets_for(&dir);
                    if scoped.is_empty() {
                        self.targets.clone()
                    } else {
                        scoped
                    }
                }
                None => self.targets.clone(),
            };

            info!(targets = ?to_query, "querying for build files");
            let mut bazel = self.new_bazel();
            self.build_watched = self
                .reconciler
                .reconcile_targets(
                    bazel.as_mut(),
                    build_query,
                    &to_query,
                    self.build_watcher.as_mut(),
                    &self.build_watched,
                    &mut self.bld_dirs,
                )
                .await;

            info!(targets = ?to_query, "querying for source files");
            self.source_watched = self
                .reconciler
                .reconcile_targets(
                    bazel.as_mut(),
                    source_query,
                    &to_query,
                    self.source_watcher.as_mut(),
                    &self.source_watched,
                    &mut self.src_dirs,
                )
                .await;
        } else {
            info!("querying for files to watch");
            let mut bazel = self.new_bazel();
            self.build_watched = self
                .reconciler
                .reconcile(
                    bazel.as_mut(),
                    &build_query(&self.joined),
                    self.build_watcher.as_mut(),
                    &self.build_watched,
                )
                .await;
            self.source_watched = self
                .reconciler
                .reconcile(
                    bazel.as_mut(),
                    &source_query(&self.joined),
                    self.source_watcher.as_mut(),
                    &self.source_watched,
                )
                .await;
        }
        self.core.query_done();
    }

    async fn do_wait(&mut self) {
        let (kind, event) = tokio::select! {
            event = self.source_events.recv() => (ChangeKind::Source, event),
            event = self.build_events.recv() => (ChangeKind::Graph, event),
        };
        self.observe(kind, event);
    }

    /// Wait for either another in-class event (extending the quiet period) or
    /// the debounce deadline. Off-class events stay buffered in their channel
    /// and are observed on the next WAIT.
    async fn do_debounce(&mut self, kind: ChangeKind) {
        let deadline = self
            .debounce_deadline
            .unwrap_or_else(|| Instant::now() + self.opts.debounce);

        let received = match kind {
            ChangeKind::Source => tokio::select! {
                event = self.source_events.recv() => Some(event),
                _ = tokio::time::sleep_until(deadline) => None,
            },
            ChangeKind::Graph => tokio::select! {
                event = self.build_events.recv() => Some(event),
                _ = tokio::time::sleep_until(deadline) => None,
            },
        };

        match received {
            Some(event) => self.observe(kind, event),
            None => {
                self.debounce_deadline = None;
                self.core.debounce_expired();
            }
        }
    }

    /// Feed one received event (or end-of-stream) into the state machine.
    ///
    /// Events are acted on only when they are modifying and their path is in
    /// the originating watcher's watch set; everything else is ignored
    /// without a state change. Accepted events fan out `change_detected` and
    /// push the debounce deadline forward.
    fn observe(&mut self, kind: ChangeKind, event: Option<WatchEvent>) {
        let Some(event) = event else {
            info!("event stream ended; quitting");
            self.core.quit();
            return;
        };

        if !is_modifying(event.op) {
            return;
        }
        let watched = match kind {
            ChangeKind::Source => self.source_watched.contains(&event.path),
            ChangeKind::Graph => self.build_watched.contains(&event.path),
        };
        if !watched {
            debug!(path = ?event.path, "ignoring event for unwatched file");
            return;
        }

        if self.core.note_change(kind, event.path.parent()) {
            match kind {
                ChangeKind::Source => info!(path = ?event.path, "changed; rebuilding"),
                ChangeKind::Graph => info!(path = ?event.path, "build graph changed; requerying"),
            }
            self.change_detected(kind, &event.path);
            self.debounce_deadline = Some(Instant::now() + self.opts.debounce);
        }
    }

    async fn do_run(&mut self) {
        // After the first full build, a change confined to one directory only
        // rebuilds the targets associated with it.
        let torun = match self.core.take_prev_dir() {
            Some(dir) if self.multi && self.core.first_build_passed() => {
                let scoped = self.src_dirs.targets_for(&dir);
                if scoped.is_empty() {
                    self.targets.clone()
                } else {
                    scoped
                }
            }
            _ => self.targets.clone(),
        };

        let verb = self.verb;
        info!("{} {}", verb.gerund(), torun.join(" "));
        self.before_command(&torun, verb.as_str());

        match (verb, self.multi) {
            (Verb::Build, _) => {
                let (output, ok) = self.invoke_build(torun.clone()).await;
                self.after_command(&torun, verb.as_str(), ok, &output);
            }
            (Verb::Test, _) => {
                let (output, ok) = self.invoke_test(torun.clone()).await;
                self.after_command(&torun, verb.as_str(), ok, &output);
            }
            (Verb::Run, false) => {
                let (output, ok) = self.run_single().await;
                self.after_command(&torun, verb.as_str(), ok, &output);
            }
            (Verb::Run, true) => {
                let (buffers, ok) = self.run_multiple(&torun).await;
                for buffer in &buffers {
                    self.after_command(&torun, verb.as_str(), ok, buffer);
                }
            }
        }

        self.core.run_done();
    }

    async fn invoke_build(&mut self, targets: Vec<String>) -> (OutputBuffer, bool) {
        let mut bazel = self.new_bazel();
        bazel.cancel();
        bazel.write_to_stderr(true);
        bazel.write_to_stdout(true);
        let (output, result) = bazel.build(targets).await;
        if let Err(err) = &result {
            error!(error = %err, "build error");
        }
        (output, result.is_ok())
    }

    async fn invoke_test(&mut self, targets: Vec<String>) -> (OutputBuffer, bool) {
        let mut bazel = self.new_bazel();
        bazel.cancel();
        bazel.write_to_stderr(true);
        bazel.write_to_stdout(true);
        let (output, result) = bazel.test(targets).await;
        if let Err(err) = &result {
            error!(error = %err, "test error");
        }
        (output, result.is_ok())
    }

    /// Single-target run phase: first pass creates and starts the handle,
    /// every later pass propagates changes to it.
    async fn run_single(&mut self) -> (OutputBuffer, bool) {
        let Some(target) = self.targets.first().cloned() else {
            return (OutputBuffer::default(), false);
        };
        let sink = self.log_sink_for(&target);

        if let Some(cmd) = self.cmds.get_mut(&target) {
            info!("notifying of changes");
            let buffer = cmd.notify_of_changes(sink).await;
            return (buffer, true);
        }

        match self.setup_run(&target).await {
            Ok(mut cmd) => {
                let started = cmd.start(sink).await;
                self.cmds.insert(target.clone(), cmd);
                match started {
                    Ok(buffer) => (buffer, true),
                    Err(err) => {
                        error!(target = %target, error = %err, "run start failed");
                        (OutputBuffer::default(), false)
                    }
                }
            }
            Err(err) => {
                error!(target = %target, error = %err, "run setup failed");
                (OutputBuffer::default(), false)
            }
        }
    }

    /// Multi-target run phase: rebuild first, then start or notify each
    /// handle. On build failure the collected buffers are returned as-is and
    /// nothing is notified.
    async fn run_multiple(&mut self, torun: &[String]) -> (Vec<OutputBuffer>, bool) {
        let existing: Vec<String> = self.cmds.keys().cloned().collect();
        for target in &existing {
            if let Some(cmd) = self.cmds.get_mut(target) {
                cmd.before_rebuild().await;
            }
        }

        info!("rebuilding changed targets");
        let (build_output, build_ok) = self.invoke_build(torun.to_vec()).await;
        self.after_command(torun, "build", build_ok, &build_output);
        if !build_ok {
            return (vec![build_output], false);
        }
        self.core.mark_first_build_passed();

        let mut buffers = Vec::new();
        if self.cmds.is_empty() {
            for target in torun {
                let sink = self.log_sink_for(target);
                match self.setup_run(target).await {
                    Ok(mut cmd) => {
                        let started = cmd.start(sink).await;
                        self.cmds.insert(target.clone(), cmd);
                        match started {
                            Ok(buffer) => buffers.push(buffer),
                            Err(err) => {
                                error!(target = %target, error = %err, "run start failed");
                                return (buffers, false);
                            }
                        }
                    }
                    Err(err) => {
                        error!(target = %target, error = %err, "run setup failed");
                        return (buffers, false);
                    }
                }
            }
            return (buffers, true);
        }

        info!("notifying of changes");
        for target in torun {
            let sink = self.log_sink_for(target);
            if let Some(cmd) = self.cmds.get_mut(target) {
                buffers.push(cmd.notify_of_changes(sink).await);
            }
        }
        (buffers, true)
    }

    /// First-RUN setup for one target: query its rule, let listeners see it,
    /// and pick the handle flavour based on the notification tag.
    async fn setup_run(&mut self, target: &str) -> Result<Box<dyn Command>> {
        let rule = match self.query_rule(target).await {
            Ok(rule) => rule,
            Err(err) => {
                error!(target = %target, error = %err, "rule query failed; requesting shutdown");
                let _ = self.sig_tx.send(Sig::Terminate).await;
                tokio::time::sleep(self.opts.teardown_grace).await;
                return Err(err);
            }
        };

        for listener in &mut self.listeners {
            listener.target_decider(&rule);
        }

        let spec = CommandSpec {
            startup_args: self.startup_args.clone(),
            bazel_args: self.bazel_args.clone(),
            target: target.to_string(),
            args: self.extra_args.clone(),
        };

        let cmd = if rule.tags().any(|tag| tag == NOTIFY_CHANGES_TAG) {
            info!(target = %target, "launching with notifications");
            (self.notify_command)(spec)
        } else {
            (self.default_command)(spec)
        };
        self.registry.register(target, cmd.process());
        Ok(cmd)
    }

    async fn query_rule(&mut self, target: &str) -> Result<Rule> {
        let mut bazel = self.new_bazel();
        let result = bazel.cquery(target).await?;
        for configured in result.results {
            if configured.target.kind == RULE_KIND {
                if let Some(rule) = configured.target.rule {
                    return Ok(rule);
                }
            }
        }
        Err(WatchbazelError::NoRuleInfo(target.to_string()))
    }

    fn log_sink_for(&mut self, target: &str) -> Option<LogSink> {
        if !self.opts.run_log_to_files {
            return None;
        }
        if let Some(sink) = self.log_sinks.get(target) {
            return sink.clone();
        }
        let sink = open_log_sink(&self.fs, target);
        self.log_sinks.insert(target.to_string(), sink.clone());
        sink
    }

    fn change_detected(&mut self, kind: ChangeKind, path: &Path) {
        let targets = self.targets.clone();
        for listener in &mut self.listeners {
            listener.change_detected(&targets, kind, path);
        }
    }

    fn before_command(&mut self, targets: &[String], command: &str) {
        for listener in &mut self.listeners {
            listener.before_command(targets, command);
        }
    }

    fn after_command(
        &mut self,
        targets: &[String],
        command: &str,
        success: bool,
        output: &OutputBuffer,
    ) {
        for listener in &mut self.listeners {
            listener.after_command(targets, command, success, output);
        }
    }
}
