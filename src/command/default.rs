// src/command/default.rs

//! Restart-style subprocess handle.
//!
//! `bazel run` both rebuilds and relaunches the target, so propagating a
//! change is simply: kill the old subprocess, run it again.

use std::path::PathBuf;
use std::process::Stdio;

use tracing::{error, info};

use crate::command::process::{spawn_drain, EchoStream, SharedProcess};
use crate::command::{Command, CommandSpec, LogSink};
use crate::errors::Result;
use crate::types::{BoxFuture, OutputBuffer};

pub struct DefaultCommand {
    bazel_path: PathBuf,
    spec: CommandSpec,
    proc: SharedProcess,
}

impl DefaultCommand {
    pub fn new(bazel_path: impl Into<PathBuf>, spec: CommandSpec) -> Self {
        Self {
            bazel_path: bazel_path.into(),
            spec,
            proc: SharedProcess::new(),
        }
    }

    /// Spawn `bazel run <target> -- <args>` and wire its output into a fresh
    /// buffer, the parent's stdio, and the log sink.
    async fn launch(&mut self, log: Option<LogSink>) -> Result<OutputBuffer> {
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
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn()?;
        if let Some(stdout) = child.stdout.take() {
            spawn_drain(stdout, buffer.clone(), Some(EchoStream::Stdout), log.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_drain(stderr, buffer.clone(), Some(EchoStream::Stderr), log);
        }
        self.proc.attach(child);

        info!(target = %self.spec.target, "subprocess started");
        Ok(buffer)
    }
}

impl Command for DefaultCommand {
    fn start(&mut self, log: Option<LogSink>) -> BoxFuture<'_, Result<OutputBuffer>> {
        Box::pin(self.launch(log))
    }

    fn before_rebuild(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }

    fn notify_of_changes(&mut self, log: Option<LogSink>) -> BoxFuture<'_, OutputBuffer> {
        Box::pin(async move {
            self.proc.terminate();
            match self.launch(log).await {
                Ok(buffer) => buffer,
                Err(err) => {
                    error!(target = %self.spec.target, error = %err, "restart failed");
                    OutputBuffer::default()
                }
            }
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
