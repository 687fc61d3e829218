// src/watch/watcher.rs

//! Watcher facade over the notify crate.

use std::path::Path;

use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::debug;

use crate::errors::{Result, WatchbazelError};
use crate::watch::events::{classify, WatchEvent};

/// Four-operation watcher contract consumed by the engine.
///
/// Paths passed to `add`/`remove` are always directories: the parent of each
/// file of interest. Which files inside a watched parent actually matter is
/// tracked by the watch set, not here.
pub trait FileWatcher: Send {
    /// Begin observing a directory. Repeated adds of the same path must not
    /// fail.
    fn add(&mut self, path: &Path) -> Result<()>;

    /// Stop observing a directory.
    fn remove(&mut self, path: &Path) -> Result<()>;

    /// Release all resources. The event stream ends after this.
    fn close(&mut self);
}

/// Facade over `notify::RecommendedWatcher`.
///
/// The notify callback runs on notify's own thread and forwards each path of
/// each event into an unbounded channel, so event producers never block.
pub struct NotifyWatcher {
    inner: Option<RecommendedWatcher>,
}

impl NotifyWatcher {
    /// Create the watcher and the event stream it feeds.
    pub fn new() -> Result<(Self, mpsc::UnboundedReceiver<WatchEvent>)> {
        let (tx, rx) = mpsc::unbounded_channel::<WatchEvent>();

        // Closure called synchronously by notify whenever an event arrives.
        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    let op = classify(&event.kind);
                    for path in event.paths {
                        // Send failure means the engine is gone; nothing to do.
                        let _ = tx.send(WatchEvent { path, op });
                    }
                }
                Err(err) => {
                    // We can't log via tracing here easily, so fall back to stderr.
                    eprintln!("watchbazel: file watch error: {err}");
                }
            },
            Config::default(),
        )?;

        Ok((Self { inner: Some(watcher) }, rx))
    }
}

impl FileWatcher for NotifyWatcher {
    fn add(&mut self, path: &Path) -> Result<()> {
        let Some(watcher) = self.inner.as_mut() else {
            return Ok(());
        };
        watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|source| WatchbazelError::UnwatchableTarget {
                path: path.to_path_buf(),
                source,
            })
    }

    fn remove(&mut self, path: &Path) -> Result<()> {
        let Some(watcher) = self.inner.as_mut() else {
            return Ok(());
        };
        watcher.unwatch(path)?;
        Ok(())
    }

    fn close(&mut self) {
        // Dropping the watcher drops the forwarding callback and with it the
        // channel sender, so the receiver yields end-of-stream.
        debug!("closing file watcher");
        self.inner = None;
    }
}
