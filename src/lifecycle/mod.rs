// src/lifecycle/mod.rs

//! Lifecycle listeners observing engine events.
//!
//! The engine fans each event out to a fixed, ordered list of listeners:
//! start-up info, the rule of each run target, detected changes, and the
//! before/after of every command. Methods default to no-ops so a listener
//! implements only what it cares about.

use std::collections::HashMap;
use std::path::Path;

use crate::bazel::Rule;
use crate::engine::ChangeKind;
use crate::types::OutputBuffer;

pub mod output_runner;

pub use output_runner::OutputRunner;

pub trait Lifecycle: Send {
    /// Called once at engine start-up with the build tool's info map.
    fn initialize(&mut self, _info: &HashMap<String, String>) {}

    /// Called with the rule of each run target when it is first set up, so
    /// listeners can register interest in its later events.
    fn target_decider(&mut self, _rule: &Rule) {}

    /// A watched file changed; `kind` says whether it was a source file or a
    /// build-description file.
    fn change_detected(&mut self, _targets: &[String], _kind: ChangeKind, _change: &Path) {}

    fn before_command(&mut self, _targets: &[String], _command: &str) {}

    fn after_command(
        &mut self,
        _targets: &[String],
        _command: &str,
        _success: bool,
        _output: &OutputBuffer,
    ) {
    }

    /// Called once, in listener order, at teardown.
    fn cleanup(&mut self) {}
}
