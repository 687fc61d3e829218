// src/bazel/query.rs

//! Typed view of bazel query output.
//!
//! `bazel query --output=streamed_jsonproto` emits one JSON-encoded target per
//! line; `bazel cquery --output=jsonproto` emits a single result object. Only
//! the fields the engine consults are modelled: target type, source-file
//! labels, and rule attributes (of which only `tags` is ever read).

use serde::Deserialize;

use crate::errors::Result;

/// Target type string for source files.
pub const SOURCE_FILE_KIND: &str = "SOURCE_FILE";
/// Target type string for rules.
pub const RULE_KIND: &str = "RULE";
/// Attribute type string for string-list attributes.
pub const STRING_LIST_KIND: &str = "STRING_LIST";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub source_file: Option<SourceFile>,
    #[serde(default)]
    pub rule: Option<Rule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceFile {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub name: String,
    #[serde(default)]
    pub attribute: Vec<Attribute>,
}

impl Rule {
    /// The rule's `tags` attribute, empty if absent.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.attribute
            .iter()
            .filter(|a| a.name == "tags" && a.kind == STRING_LIST_KIND)
            .flat_map(|a| a.string_list_value.iter().map(String::as_str))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub string_list_value: Vec<String>,
}

/// Result of a `query` call.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub targets: Vec<Target>,
}

impl QueryResult {
    /// Parse `--output=streamed_jsonproto` output (one target per line).
    pub fn parse_streamed(stdout: &str) -> Result<Self> {
        let mut targets = Vec::new();
        for line in stdout.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            targets.push(serde_json::from_str(line)?);
        }
        Ok(Self { targets })
    }
}

/// Result of a `cquery` call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CqueryResult {
    #[serde(default)]
    pub results: Vec<ConfiguredTarget>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfiguredTarget {
    pub target: Target,
}

impl CqueryResult {
    /// Parse `--output=jsonproto` output.
    pub fn parse(stdout: &str) -> Result<Self> {
        let trimmed = stdout.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(trimmed)?)
    }
}
