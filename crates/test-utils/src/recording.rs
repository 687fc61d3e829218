use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use watchbazel::bazel::Rule;
use watchbazel::engine::ChangeKind;
use watchbazel::lifecycle::Lifecycle;
use watchbazel::types::OutputBuffer;

/// Listener that records every lifecycle event as a readable line.
#[derive(Clone, Default)]
pub struct RecordingListener {
    events: Arc<Mutex<Vec<String>>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// Recorded lines starting with the given prefix.
    pub fn events_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|e| e.starts_with(prefix))
            .collect()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl Lifecycle for RecordingListener {
    fn initialize(&mut self, _info: &HashMap<String, String>) {
        self.push("initialize".to_string());
    }

    fn target_decider(&mut self, rule: &Rule) {
        self.push(format!("target_decider {}", rule.name));
    }

    fn change_detected(&mut self, targets: &[String], kind: ChangeKind, change: &Path) {
        self.push(format!(
            "change_detected {} {} [{}]",
            kind,
            change.display(),
            targets.join(" ")
        ));
    }

    fn before_command(&mut self, targets: &[String], command: &str) {
        self.push(format!("before_command {} [{}]", command, targets.join(" ")));
    }

    fn after_command(
        &mut self,
        targets: &[String],
        command: &str,
        success: bool,
        _output: &OutputBuffer,
    ) {
        self.push(format!(
            "after_command {} success={} [{}]",
            command,
            success,
            targets.join(" ")
        ));
    }

    fn cleanup(&mut self) {
        self.push("cleanup".to_string());
    }
}
