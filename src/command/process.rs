// src/command/process.rs

//! Shared child-process handles.

use std::collections::HashMap;
use std::io::Write;
use std::process::ExitStatus;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tracing::debug;

use crate::command::LogSink;
use crate::types::OutputBuffer;

/// A child-process handle that can be observed and terminated from a task
/// other than the one that spawned it.
///
/// The engine replaces the held child during RUN; the signal task only calls
/// `is_running` and `terminate`. Terminating an already-dead process is a
/// no-op, so overlapping access needs no coordination beyond the mutex.
#[derive(Debug, Clone, Default)]
pub struct SharedProcess {
    child: Arc<Mutex<Option<Child>>>,
}

impl SharedProcess {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held child. Any previous child is killed first.
    pub fn attach(&self, child: Child) {
        let mut guard = self.child.lock().unwrap();
        if let Some(old) = guard.as_mut() {
            let _ = old.start_kill();
        }
        *guard = Some(child);
    }

    pub fn is_running(&self) -> bool {
        let mut guard = self.child.lock().unwrap();
        match guard.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    pub fn terminate(&self) {
        let mut guard = self.child.lock().unwrap();
        if let Some(child) = guard.as_mut() {
            let _ = child.start_kill();
        }
    }

    /// Wait for the child to exit without holding the lock across suspension
    /// points (the signal task may terminate the child while we wait).
    ///
    /// Returns `None` if there is no child attached.
    pub async fn wait(&self) -> Option<ExitStatus> {
        loop {
            {
                let mut guard = self.child.lock().unwrap();
                match guard.as_mut() {
                    None => return None,
                    Some(child) => {
                        if let Ok(Some(status)) = child.try_wait() {
                            *guard = None;
                            return Some(status);
                        }
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }
}

/// Registry of run-mode subprocess handles, shared with the signal task.
#[derive(Debug, Clone, Default)]
pub struct ProcessRegistry {
    procs: Arc<Mutex<HashMap<String, SharedProcess>>>,
}

impl ProcessRegistry {
    pub fn register(&self, target: &str, proc: SharedProcess) {
        self.procs
            .lock()
            .unwrap()
            .insert(target.to_string(), proc);
    }

    /// Terminate every running subprocess. Returns whether any was running.
    pub fn terminate_all(&self) -> bool {
        let procs: Vec<SharedProcess> = self.procs.lock().unwrap().values().cloned().collect();
        let mut any_running = false;
        for proc in procs {
            if proc.is_running() {
                any_running = true;
                proc.terminate();
            }
        }
        any_running
    }
}

/// Where drained output lines are echoed, in addition to the buffer.
#[derive(Debug, Clone, Copy)]
pub(crate) enum EchoStream {
    Stdout,
    Stderr,
}

/// Drain a child stream line-by-line into the output buffer, echoing and
/// appending to the log sink as configured. Runs until the stream ends.
pub(crate) fn spawn_drain(
    stream: impl AsyncRead + Unpin + Send + 'static,
    buffer: OutputBuffer,
    echo: Option<EchoStream>,
    log: Option<LogSink>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            buffer.append_line(&line);
            match echo {
                Some(EchoStream::Stdout) => println!("{line}"),
                Some(EchoStream::Stderr) => eprintln!("{line}"),
                None => {}
            }
            if let Some(log) = &log {
                let mut sink = log.lock().unwrap();
                let _ = writeln!(sink, "{line}");
            }
        }
        debug!("output stream drained");
    })
}
