// src/command/notify.rs

//! Notifying subprocess handle.
//!
//! Targets whose rule is tagged for notification are started once and kept
//! running. Around every rebuild they receive protocol lines on stdin:
//!
//! ```text
//! IBAZEL_BUILD_STARTED
//! IBAZEL_BUILD_COMPLETED SUCCESS|FAILURE
//! ```
//!
//! `notify_of_changes` rebuilds the target with a dedicated bazel client to
//! determine the completion status, then reports it to the subprocess.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::ChildStdin;
use tracing::{info, warn};

use crate::bazel::BazelFactory;
use crate::command::process::{spawn_drain, EchoStream, SharedProcess};
use crate::command::{Command, CommandSpec, LogSink};
use crate::errors::Result;
use crate::types::{BoxFuture, OutputBuffer};

pub struct NotifyCommand {
    bazel_path: PathBuf,
    spec: CommandSpec,
    bazel_factory: BazelFactory,
    proc: SharedProcess,
    stdin: Option<ChildStdin>,
}

impl NotifyCommand {
    pub fn new(
        bazel_path: impl Into<PathBuf>,
        spec: CommandSpec,
        bazel_factory: BazelFactory,
    ) -> Self {
        Self {
            bazel_path: bazel_path.into(),
            spec,
            bazel_factory,
            proc: SharedProcess::new(),
            stdin: None,
        }
    }

    async fn send(&mut self, line: &str) {
        if let Some(stdin) = self.stdin.as_mut() {
            let message = format!("{line}\n");
            if let Err(err) = stdin.write_all(message.as_bytes()).await {
                warn!(
                    target = %self.spec.target,
                    error = %err,
                    "failed to notify subprocess"
                );
            }
        }
    }
}

impl Command for NotifyCommand {
    fn start(&mut self, log: Option<LogSink>) -> BoxFuture<'_, Result<OutputBuffer>> {
        Box::pin(async move {
            let buffer = OutputBuffer::new();

            let mut cmd = tokio::process::Command::new(&self.bazel_path);
            cmd.args(&self.spec.startup_args);
            cmd.arg("run");
            cmd.args(&self.spec.bazel_args);
            cmd.arg(&self.spec.target);
            if !self.spec.args.is_empty() {
                cmd.arg("--");
                cmd.args(&self.spec.args);
            }
            cmd.stdin(Stdio::piped());
            cmd.stdout(Stdio::piped());
            cmd.stderr(Stdio::piped());
            cmd.kill_on_drop(true);

            let mut child = cmd.spawn()?;
            self.stdin = child.stdin.take();
            if let Some(stdout) = child.stdout.take() {
                spawn_drain(stdout, buffer.clone(), Some(EchoStream::Stdout), log.clone());
            }
            if let Some(stderr) = child.stderr.take() {
                spawn_drain(stderr, buffer.clone(), Some(EchoStream::Stderr), log);
            }
            self.proc.attach(child);

            info!(target = %self.spec.target, "subprocess started with notifications");
            Ok(buffer)
        })
    }

    fn before_rebuild(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.send("IBAZEL_BUILD_STARTED").await;
        })
    }

    fn notify_of_changes(&mut self, _log: Option<LogSink>) -> BoxFuture<'_, OutputBuffer> {
        Box::pin(async move {
            let mut bazel = (self.bazel_factory)();
            bazel.set_startup_args(self.spec.startup_args.clone());
            bazel.set_arguments(self.spec.bazel_args.clone());
            bazel.write_to_stderr(true);
            bazel.write_to_stdout(true);

            let (buffer, result) = bazel.build(vec![self.spec.target.clone()]).await;
            let status = if result.is_ok() { "SUCCESS" } else { "FAILURE" };
            self.send(&format!("IBAZEL_BUILD_COMPLETED {status}")).await;

            buffer
        })
    }

    fn terminate(&mut self) {
        self.proc.terminate();
    }

    fn is_running(&self) -> bool {
        self.proc.is_running()
    }

    fn process(&self) -> SharedProcess {
        self.proc.clone()
    }
}
