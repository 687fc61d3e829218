// src/lifecycle/output_runner.rs

//! Execute commands that the build prints into its output.
//!
//! Some rules emit ready-to-run fix-up commands (buildozer invocations) when
//! the build graph is out of date. With `--run-output` enabled this listener
//! scans every command's output for them and runs them from the workspace
//! root, optionally asking first.

use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::sync::Arc;

use regex::Regex;
use tracing::{error, info};

use crate::lifecycle::Lifecycle;
use crate::types::OutputBuffer;
use crate::workspace::WorkspaceFinder;

pub struct OutputRunner {
    enabled: bool,
    interactive: bool,
    workspace: Arc<dyn WorkspaceFinder>,
    pattern: Regex,
}

impl OutputRunner {
    pub fn new(enabled: bool, interactive: bool, workspace: Arc<dyn WorkspaceFinder>) -> Self {
        Self {
            enabled,
            interactive,
            workspace,
            pattern: Regex::new(r"^(buildozer) '(.*)'(.*)$").expect("static pattern"),
        }
    }

    fn execute(&self, program: &str, args: &[String]) {
        let workspace = match self.workspace.find_workspace() {
            Ok(path) => path,
            Err(err) => {
                error!(error = %err, "cannot execute output command without a workspace");
                return;
            }
        };

        info!(program = %program, ?args, "executing command from output");
        let status = std::process::Command::new(program)
            .args(args)
            .current_dir(&workspace)
            .status();
        match status {
            Ok(status) if status.success() => {}
            Ok(status) => error!(program = %program, %status, "output command failed"),
            Err(err) => error!(program = %program, error = %err, "output command failed to start"),
        }
    }
}

impl Lifecycle for OutputRunner {
    fn initialize(&mut self, _info: &HashMap<String, String>) {}

    fn after_command(
        &mut self,
        _targets: &[String],
        _command: &str,
        _success: bool,
        output: &OutputBuffer,
    ) {
        if !self.enabled {
            return;
        }

        let snapshot = output.snapshot();
        for line in snapshot.lines() {
            let Some(caps) = self.pattern.captures(line) else {
                continue;
            };
            let program = caps[1].to_string();
            let args: Vec<String> = caps
                .iter()
                .skip(2)
                .flatten()
                .map(|m| m.as_str().trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();

            if self.interactive && !prompt(line) {
                continue;
            }
            self.execute(&program, &args);
        }
    }
}

/// Ask on stderr whether the matched command should run. Anything but an
/// explicit `y` declines.
fn prompt(command: &str) -> bool {
    eprint!("Do you want to execute this command?\n{command}\n[y/N] ");
    let _ = std::io::stderr().flush();

    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    answer.trim().eq_ignore_ascii_case("y")
}
