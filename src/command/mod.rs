// src/command/mod.rs

//! Run-mode subprocess handles.
//!
//! Each run target gets a [`Command`] handle on its first RUN. A default
//! handle restarts the built binary after every rebuild; a notifying handle
//! (for rules tagged [`NOTIFY_CHANGES_TAG`]) keeps the subprocess alive and
//! tells it about builds over stdin instead.

use std::io::Write;
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::errors::Result;
use crate::fs::FileSystem;
use crate::types::{BoxFuture, OutputBuffer};

pub mod default;
pub mod notify;
pub mod process;

pub use default::DefaultCommand;
pub use notify::NotifyCommand;
pub use process::{ProcessRegistry, SharedProcess};

/// Rule tag that opts a target into in-band change notification.
pub const NOTIFY_CHANGES_TAG: &str = "ibazel_notify_changes";

/// Scratch directory for per-target run logs.
pub const RUN_LOG_DIR: &str = "/tmp/watchbazel";

/// Append-only sink for a run target's subprocess output.
pub type LogSink = Arc<Mutex<Box<dyn Write + Send>>>;

/// Capability bundle for one run target's subprocess.
pub trait Command: Send {
    /// Launch the target's subprocess. Called once per handle.
    fn start(&mut self, log: Option<LogSink>) -> BoxFuture<'_, Result<OutputBuffer>>;

    /// A rebuild of the target is about to happen.
    fn before_rebuild(&mut self) -> BoxFuture<'_, ()>;

    /// A rebuild finished; propagate the change to the subprocess, either by
    /// restarting it or by notifying it in-band.
    fn notify_of_changes(&mut self, log: Option<LogSink>) -> BoxFuture<'_, OutputBuffer>;

    fn terminate(&mut self);

    fn is_running(&self) -> bool;

    /// Handle observed by the signal task.
    fn process(&self) -> SharedProcess;
}

/// Everything needed to construct a command handle for one target.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub startup_args: Vec<String>,
    pub bazel_args: Vec<String>,
    pub target: String,
    pub args: Vec<String>,
}

/// Factory signature for creating command handles (injectable for tests).
pub type CommandFactory = Arc<dyn Fn(CommandSpec) -> Box<dyn Command> + Send + Sync>;

/// Open the append-only log sink for a target, if possible.
///
/// The filename is the target label with every character outside
/// `[a-zA-Z0-9-]` stripped. Failures are logged and yield `None`; running
/// without a log sink is always acceptable.
pub fn open_log_sink(fs: &Arc<dyn FileSystem>, target: &str) -> Option<LogSink> {
    let name: String = target
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();

    let dir = std::path::Path::new(RUN_LOG_DIR);
    if let Err(err) = fs.create_dir_all(dir) {
        warn!(error = %err, "cannot create run log directory");
        return None;
    }

    match fs.open_append(&dir.join(format!("{name}.log"))) {
        Ok(writer) => Some(Arc::new(Mutex::new(writer))),
        Err(err) => {
            warn!(target = %target, error = %err, "cannot open run log file");
            None
        }
    }
}
