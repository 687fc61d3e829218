// src/types.rs

//! Small shared types used across the crate.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

/// Boxed future alias used by object-safe traits with async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The bazel operation the engine repeats on every change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Build,
    Test,
    Run,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Build => "build",
            Verb::Test => "test",
            Verb::Run => "run",
        }
    }

    /// Gerund used in progress log lines ("Building //foo ...").
    pub fn gerund(&self) -> &'static str {
        match self {
            Verb::Build => "Building",
            Verb::Test => "Testing",
            Verb::Run => "Running",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared, append-only command output buffer.
///
/// Clones are cheap and all observe the same contents. Run-mode subprocesses
/// keep appending after the buffer has been fanned out to listeners, so
/// consumers take a [`snapshot`](OutputBuffer::snapshot) at the point they
/// care about.
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer {
    contents: Arc<Mutex<String>>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_line(&self, line: &str) {
        let mut contents = self.contents.lock().unwrap();
        contents.push_str(line);
        contents.push('\n');
    }

    /// Copy of the contents accumulated so far.
    pub fn snapshot(&self) -> String {
        self.contents.lock().unwrap().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.lock().unwrap().is_empty()
    }
}
