// src/engine/mod.rs

//! The watch-and-run engine.
//!
//! This module ties together:
//! - the six-state watch loop that re-runs the bazel verb on changes
//! - query-driven reconciliation of the watched file sets
//! - debounce handling that collapses bursts of edits into one run
//! - lifecycle fan-out to the listener list
//! - signal handling that tears down managed subprocesses
//!
//! The pure state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`]; signal plumbing in [`signals`].

use std::fmt;
use std::time::Duration;

pub mod core;
pub mod runtime;
pub mod signals;

pub use self::core::EngineCore;
pub use runtime::{Engine, EngineDeps};
pub use signals::{
    spawn_os_signal_forwarder, spawn_signal_task, Sig, SignalHandler, SIGNAL_EXIT_CODE,
};

/// Engine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Re-derive the watched file sets from the build graph.
    Query,
    /// A build-description file changed; waiting out the quiet period before
    /// re-querying.
    DebounceQuery,
    /// Waiting for a watched file to change.
    Wait,
    /// A source file changed; waiting out the quiet period before re-running.
    DebounceRun,
    /// Run the configured bazel verb.
    Run,
    /// Terminal state, entered when an event stream ends.
    Quit,
}

/// Classification of a detected change, as reported to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// A source file participating in the target set.
    Source,
    /// A build-description file; the shape of the graph may have changed.
    Graph,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Source => "source",
            ChangeKind::Graph => "graph",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tunables of the engine loop.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Quiet period since the last in-class event before acting on it.
    pub debounce: Duration,
    /// Open an append-only per-target log file for run-mode subprocesses.
    pub run_log_to_files: bool,
    /// Grace window between requesting shutdown (rule query failure) and the
    /// signal task exiting the process.
    pub teardown_grace: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(100),
            run_log_to_files: false,
            teardown_grace: Duration::from_secs(10),
        }
    }
}
