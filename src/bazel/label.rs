// src/bazel/label.rs

//! Label handling: rewriting workspace-relative labels into filesystem paths.

use std::path::{Path, PathBuf, MAIN_SEPARATOR_STR};

/// Rewrite a label like `//path/to:foo` into an absolute path under
/// `workspace`.
///
/// Labels from external repositories (`@repo//...` or `//external/...`) are
/// not part of the workspace and yield `None`.
pub fn label_to_path(workspace: &Path, label: &str) -> Option<PathBuf> {
    if label.starts_with('@') || label.starts_with("//external") {
        return None;
    }
    let rel = label.strip_prefix("//").unwrap_or(label);
    let rel = rel.replacen(':', MAIN_SEPARATOR_STR, 1);
    Some(workspace.join(rel))
}

/// Split a label into its repository and target parts.
///
/// `@repo//my:target` yields `("repo", "my:target")`; the main repository is
/// the empty string, as in `@//my:target` yielding `("", "my:target")`.
pub fn parse_target(label: &str) -> Option<(&str, &str)> {
    let rest = label.strip_prefix('@')?;
    rest.split_once("//")
}
