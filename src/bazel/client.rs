// src/bazel/client.rs

//! Bazel client: the engine-facing trait and the subprocess-backed
//! implementation.
//!
//! The trait is the seam between the engine and the build tool. Production
//! code uses [`BazelCli`], which shells out to the configured bazel binary;
//! tests substitute a fake that serves scripted responses.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use anyhow::anyhow;
use tokio::process::Command;
use tracing::debug;

use crate::bazel::query::{CqueryResult, QueryResult};
use crate::command::process::{spawn_drain, EchoStream, SharedProcess};
use crate::errors::{Result, WatchbazelError};
use crate::types::{BoxFuture, OutputBuffer};

/// Operations the engine needs from the build tool.
pub trait Bazel: Send {
    fn set_startup_args(&mut self, args: Vec<String>);
    fn set_arguments(&mut self, args: Vec<String>);

    /// Echo build/test output to the parent's stdout as it streams.
    fn write_to_stdout(&mut self, enable: bool);
    /// Echo build/test output to the parent's stderr as it streams.
    fn write_to_stderr(&mut self, enable: bool);

    /// Abort any in-flight operation on this client.
    fn cancel(&mut self);

    fn query(&mut self, expr: &str) -> BoxFuture<'_, Result<QueryResult>>;
    fn cquery(&mut self, expr: &str) -> BoxFuture<'_, Result<CqueryResult>>;
    fn info(&mut self) -> BoxFuture<'_, Result<HashMap<String, String>>>;
    fn build(&mut self, targets: Vec<String>) -> BoxFuture<'_, (OutputBuffer, Result<()>)>;
    fn test(&mut self, targets: Vec<String>) -> BoxFuture<'_, (OutputBuffer, Result<()>)>;
}

/// Factory producing a fresh client per engine phase (injectable for tests).
pub type BazelFactory = Arc<dyn Fn() -> Box<dyn Bazel> + Send + Sync>;

/// Client that drives a real bazel binary.
pub struct BazelCli {
    bazel_path: PathBuf,
    startup_args: Vec<String>,
    arguments: Vec<String>,
    echo_stdout: bool,
    echo_stderr: bool,
    current: SharedProcess,
}

impl BazelCli {
    pub fn new(bazel_path: impl Into<PathBuf>) -> Self {
        Self {
            bazel_path: bazel_path.into(),
            startup_args: Vec::new(),
            arguments: Vec::new(),
            echo_stdout: false,
            echo_stderr: false,
            current: SharedProcess::new(),
        }
    }

    /// `bazel <startup args> <subcommand> <command args>`, without the
    /// trailing operation-specific arguments.
    fn base_command(&self, subcommand: &str) -> Command {
        let mut cmd = Command::new(&self.bazel_path);
        cmd.args(&self.startup_args);
        cmd.arg(subcommand);
        cmd.args(&self.arguments);
        cmd.stdin(Stdio::null());
        cmd
    }

    /// Run a subcommand to completion and return its stdout. Used for the
    /// query family, where output is parsed rather than shown.
    async fn run_to_stdout(&mut self, subcommand: &str, args: &[String]) -> Result<String> {
        debug!(subcommand, ?args, "invoking bazel");
        let output = self.base_command(subcommand).args(args).output().await?;
        if !output.status.success() {
            return Err(WatchbazelError::QueryFailed {
                operation: subcommand.to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Run build/test, streaming output into a shared buffer (and echoing it
    /// as configured). The child is held in `current` so `cancel()` can abort
    /// it from another task.
    async fn run_streaming(
        &mut self,
        subcommand: &'static str,
        targets: Vec<String>,
    ) -> (OutputBuffer, Result<()>) {
        let buffer = OutputBuffer::new();

        let mut cmd = self.base_command(subcommand);
        cmd.args(&targets);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => return (buffer, Err(err.into())),
        };

        if let Some(stdout) = child.stdout.take() {
            let echo = self.echo_stdout.then_some(EchoStream::Stdout);
            spawn_drain(stdout, buffer.clone(), echo, None);
        }
        if let Some(stderr) = child.stderr.take() {
            let echo = self.echo_stderr.then_some(EchoStream::Stderr);
            spawn_drain(stderr, buffer.clone(), echo, None);
        }

        self.current.attach(child);

        match self.current.wait().await {
            Some(status) if status.success() => (buffer, Ok(())),
            Some(status) => (
                buffer,
                Err(anyhow!("bazel {subcommand} exited with {status}").into()),
            ),
            None => (buffer, Err(anyhow!("bazel {subcommand} was cancelled").into())),
        }
    }
}

impl Bazel for BazelCli {
    fn set_startup_args(&mut self, args: Vec<String>) {
        self.startup_args = args;
    }

    fn set_arguments(&mut self, args: Vec<String>) {
        self.arguments = args;
    }

    fn write_to_stdout(&mut self, enable: bool) {
        self.echo_stdout = enable;
    }

    fn write_to_stderr(&mut self, enable: bool) {
        self.echo_stderr = enable;
    }

    fn cancel(&mut self) {
        self.current.terminate();
    }

    fn query(&mut self, expr: &str) -> BoxFuture<'_, Result<QueryResult>> {
        let args = vec![expr.to_string(), "--output=streamed_jsonproto".to_string()];
        Box::pin(async move {
            let stdout = self.run_to_stdout("query", &args).await?;
            QueryResult::parse_streamed(&stdout)
        })
    }

    fn cquery(&mut self, expr: &str) -> BoxFuture<'_, Result<CqueryResult>> {
        let args = vec![expr.to_string(), "--output=jsonproto".to_string()];
        Box::pin(async move {
            let stdout = self.run_to_stdout("cquery", &args).await?;
            CqueryResult::parse(&stdout)
        })
    }

    fn info(&mut self) -> BoxFuture<'_, Result<HashMap<String, String>>> {
        Box::pin(async move {
            let stdout = self.run_to_stdout("info", &[]).await?;
            let mut info = HashMap::new();
            for line in stdout.lines() {
                if let Some((key, value)) = line.split_once(": ") {
                    info.insert(key.to_string(), value.to_string());
                }
            }
            Ok(info)
        })
    }

    fn build(&mut self, targets: Vec<String>) -> BoxFuture<'_, (OutputBuffer, Result<()>)> {
        Box::pin(self.run_streaming("build", targets))
    }

    fn test(&mut self, targets: Vec<String>) -> BoxFuture<'_, (OutputBuffer, Result<()>)> {
        Box::pin(self.run_streaming("test", targets))
    }
}
