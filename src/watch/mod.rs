// src/watch/mod.rs

//! File watching: the watcher facade, the event model, watch sets, and the
//! query-driven reconciler.
//!
//! This module does **not** know about engine states or bazel verbs; it turns
//! query results into directory watches and delivers classified filesystem
//! events.

pub mod events;
pub mod reconcile;
pub mod watcher;
pub mod watchset;

pub use events::{classify, is_modifying, spawn_source_event_forwarder, WatchEvent, WatchOp};
pub use reconcile::{apply_plan, build_query, source_query, Reconciler};
pub use watcher::{FileWatcher, NotifyWatcher};
pub use watchset::{ReconcilePlan, TargetDirMap, WatchSet};
