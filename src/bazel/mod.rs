// src/bazel/mod.rs

//! Bazel client layer: typed query results, label handling, and the
//! subprocess-backed client implementation.

pub mod client;
pub mod label;
pub mod query;

pub use client::{Bazel, BazelCli, BazelFactory};
pub use label::{label_to_path, parse_target};
pub use query::{
    Attribute, ConfiguredTarget, CqueryResult, QueryResult, Rule, SourceFile, Target,
    RULE_KIND, SOURCE_FILE_KIND, STRING_LIST_KIND,
};
