// src/watch/events.rs

//! Watch event model and modifying-event filtering.

use std::path::PathBuf;

use notify::event::{EventKind, ModifyKind};
use tokio::sync::mpsc;

/// Classified filesystem operation carried by a watch event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOp {
    Create,
    Write,
    Remove,
    Rename,
    Chmod,
    Other,
}

/// A single filesystem observation delivered by a watcher facade.
#[derive(Debug, Clone)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub op: WatchOp,
}

/// Whether an operation modifies file content or directory structure.
///
/// Filesystem notification also fires for stat and read operations (an IDE
/// checking modified status, for example); only modifying events may trigger
/// the engine.
pub fn is_modifying(op: WatchOp) -> bool {
    matches!(
        op,
        WatchOp::Create | WatchOp::Write | WatchOp::Remove | WatchOp::Rename
    )
}

/// Map a notify event kind onto the facade's op model.
pub fn classify(kind: &EventKind) -> WatchOp {
    match kind {
        EventKind::Create(_) => WatchOp::Create,
        EventKind::Remove(_) => WatchOp::Remove,
        EventKind::Modify(ModifyKind::Name(_)) => WatchOp::Rename,
        EventKind::Modify(ModifyKind::Metadata(_)) => WatchOp::Chmod,
        EventKind::Modify(_) => WatchOp::Write,
        _ => WatchOp::Other,
    }
}

/// Forward source-watcher events into the channel the engine consumes,
/// dropping non-modifying ops on the way.
///
/// The forwarder ends when the raw stream ends (watcher closed) or when the
/// engine drops its receiver.
pub fn spawn_source_event_forwarder(
    mut raw: mpsc::UnboundedReceiver<WatchEvent>,
) -> mpsc::UnboundedReceiver<WatchEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(event) = raw.recv().await {
            if !is_modifying(event.op) {
                continue;
            }
            if tx.send(event).is_err() {
                break;
            }
        }
    });
    rx
}
