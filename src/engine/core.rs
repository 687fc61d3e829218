// src/engine/core.rs

//! Pure watch-loop state machine.
//!
//! This is the synchronous, deterministic heart of the engine: given accepted
//! change observations and debounce expirations it decides the next state.
//! The async/IO shell (`engine::runtime::Engine`) owns channels, timers,
//! queries, and command dispatch; the core owns nothing but state, which
//! keeps the whole transition graph testable without tokio.

use std::path::{Path, PathBuf};

use super::{ChangeKind, State};

#[derive(Debug)]
pub struct EngineCore {
    state: State,
    /// Parent directory of the most recently accepted event. Multi-target
    /// mode uses it to scope the next query/rebuild to the targets associated
    /// with that directory.
    prev_dir: Option<PathBuf>,
    /// Set once a full build of all targets has succeeded; incremental
    /// rebuilds are only safe after that.
    first_build_passed: bool,
    /// Whether `prev_dir` is tracked at all (multi-target mode only).
    track_dirs: bool,
}

impl EngineCore {
    pub fn new(track_dirs: bool) -> Self {
        Self {
            state: State::Query,
            prev_dir: None,
            first_build_passed: false,
            track_dirs,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// An accepted (watched, modifying) event was observed.
    ///
    /// Returns `true` when the event belongs to the current state's class and
    /// therefore starts or extends a debounce; off-class and out-of-loop
    /// events leave the state untouched.
    pub fn note_change(&mut self, kind: ChangeKind, parent: Option<&Path>) -> bool {
        let accepted = match (self.state, kind) {
            (State::Wait, ChangeKind::Source) => {
                self.state = State::DebounceRun;
                true
            }
            (State::Wait, ChangeKind::Graph) => {
                self.state = State::DebounceQuery;
                true
            }
            (State::DebounceRun, ChangeKind::Source) => true,
            (State::DebounceQuery, ChangeKind::Graph) => true,
            _ => false,
        };

        if accepted && self.track_dirs {
            if let Some(parent) = parent {
                self.prev_dir = Some(parent.to_path_buf());
            }
        }
        accepted
    }

    /// The quiet period elapsed with no further in-class events.
    pub fn debounce_expired(&mut self) {
        self.state = match self.state {
            State::DebounceRun => State::Run,
            State::DebounceQuery => State::Query,
            other => other,
        };
    }

    /// QUERY finished; both watch sets are reconciled.
    pub fn query_done(&mut self) {
        self.state = State::Run;
    }

    /// RUN finished; go back to waiting for events.
    pub fn run_done(&mut self) {
        self.prev_dir = None;
        self.state = State::Wait;
    }

    /// Consume the recorded directory, if any. QUERY and RUN each take it on
    /// entry so it never leaks across phases.
    pub fn take_prev_dir(&mut self) -> Option<PathBuf> {
        self.prev_dir.take()
    }

    pub fn first_build_passed(&self) -> bool {
        self.first_build_passed
    }

    pub fn mark_first_build_passed(&mut self) {
        self.first_build_passed = true;
    }

    /// Enter the terminal state. Only end-of-stream on an event channel leads
    /// here.
    pub fn quit(&mut self) {
        self.state = State::Quit;
    }
}
