#![allow(dead_code)]

use watchbazel::bazel::{
    Attribute, ConfiguredTarget, CqueryResult, QueryResult, Rule, SourceFile, Target,
    RULE_KIND, SOURCE_FILE_KIND, STRING_LIST_KIND,
};

/// Query result listing the given labels as source files.
pub fn source_file_query_result(labels: &[&str]) -> QueryResult {
    QueryResult {
        targets: labels
            .iter()
            .map(|label| Target {
                kind: SOURCE_FILE_KIND.to_string(),
                source_file: Some(SourceFile {
                    name: label.to_string(),
                }),
                rule: None,
            })
            .collect(),
    }
}

/// Cquery result holding a single rule with the given tags.
pub fn rule_cquery_result(name: &str, tags: &[&str]) -> CqueryResult {
    let attribute = if tags.is_empty() {
        vec![Attribute {
            name: "name".to_string(),
            kind: "STRING".to_string(),
            string_list_value: Vec::new(),
        }]
    } else {
        vec![Attribute {
            name: "tags".to_string(),
            kind: STRING_LIST_KIND.to_string(),
            string_list_value: tags.iter().map(|t| t.to_string()).collect(),
        }]
    };

    CqueryResult {
        results: vec![ConfiguredTarget {
            target: Target {
                kind: RULE_KIND.to_string(),
                source_file: None,
                rule: Some(Rule {
                    name: name.to_string(),
                    attribute,
                }),
            },
        }],
    }
}
