use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use watchbazel::bazel::{Bazel, BazelFactory, CqueryResult, QueryResult};
use watchbazel::errors::{Result, WatchbazelError};
use watchbazel::types::{BoxFuture, OutputBuffer};

/// Scripted bazel client.
///
/// Clones share state: a test keeps one handle, installs [`factory`] as the
/// engine's bazel factory, and afterwards asserts on the recorded action log
/// the way a session transcript would read.
#[derive(Clone, Default)]
pub struct FakeBazel {
    actions: Arc<Mutex<Vec<Vec<String>>>>,
    query_responses: Arc<Mutex<HashMap<String, QueryResult>>>,
    cquery_responses: Arc<Mutex<HashMap<String, CqueryResult>>>,
    info: Arc<Mutex<HashMap<String, String>>>,
    query_error: Arc<Mutex<bool>>,
    build_error: Arc<Mutex<bool>>,
    build_output: Arc<Mutex<String>>,
}

impl FakeBazel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory handing the engine clones of this fake.
    pub fn factory(&self) -> BazelFactory {
        let fake = self.clone();
        Arc::new(move || Box::new(fake.clone()) as Box<dyn Bazel>)
    }

    pub fn add_query_response(&self, expr: &str, result: QueryResult) {
        self.query_responses
            .lock()
            .unwrap()
            .insert(expr.to_string(), result);
    }

    pub fn add_cquery_response(&self, expr: &str, result: CqueryResult) {
        self.cquery_responses
            .lock()
            .unwrap()
            .insert(expr.to_string(), result);
    }

    /// Make every subsequent query/cquery fail.
    pub fn set_query_error(&self, fail: bool) {
        *self.query_error.lock().unwrap() = fail;
    }

    /// Make every subsequent build/test fail.
    pub fn set_build_error(&self, fail: bool) {
        *self.build_error.lock().unwrap() = fail;
    }

    /// Content appended to the output buffer of every build/test.
    pub fn set_build_output(&self, output: &str) {
        *self.build_output.lock().unwrap() = output.to_string();
    }

    pub fn actions(&self) -> Vec<Vec<String>> {
        self.actions.lock().unwrap().clone()
    }

    /// Recorded actions of one kind ("Build", "Query", ...).
    pub fn actions_of(&self, kind: &str) -> Vec<Vec<String>> {
        self.actions()
            .into_iter()
            .filter(|a| a.first().map(String::as_str) == Some(kind))
            .collect()
    }

    /// Assert the full action log, in order.
    pub fn assert_actions(&self, expected: &[&[&str]]) {
        let actual = self.actions();
        let expected: Vec<Vec<String>> = expected
            .iter()
            .map(|a| a.iter().map(|s| s.to_string()).collect())
            .collect();
        assert_eq!(actual, expected, "recorded bazel actions differ");
    }

    fn record(&self, action: Vec<String>) {
        self.actions.lock().unwrap().push(action);
    }

    fn command_outcome(&self, operation: &str) -> (OutputBuffer, Result<()>) {
        let buffer = OutputBuffer::new();
        let output = self.build_output.lock().unwrap().clone();
        for line in output.lines() {
            buffer.append_line(line);
        }
        let result = if *self.build_error.lock().unwrap() {
            Err(WatchbazelError::QueryFailed {
                operation: operation.to_string(),
                message: "scripted failure".to_string(),
            })
        } else {
            Ok(())
        };
        (buffer, result)
    }
}

impl Bazel for FakeBazel {
    fn set_startup_args(&mut self, _args: Vec<String>) {}

    fn set_arguments(&mut self, _args: Vec<String>) {}

    fn write_to_stdout(&mut self, _enable: bool) {
        self.record(vec!["WriteToStdout".to_string()]);
    }

    fn write_to_stderr(&mut self, _enable: bool) {
        self.record(vec!["WriteToStderr".to_string()]);
    }

    fn cancel(&mut self) {
        self.record(vec!["Cancel".to_string()]);
    }

    fn query(&mut self, expr: &str) -> BoxFuture<'_, Result<QueryResult>> {
        self.record(vec!["Query".to_string(), expr.to_string()]);
        let fail = *self.query_error.lock().unwrap();
        let response = self.query_responses.lock().unwrap().get(expr).cloned();
        Box::pin(async move {
            if fail {
                return Err(WatchbazelError::QueryFailed {
                    operation: "query".to_string(),
                    message: "scripted failure".to_string(),
                });
            }
            Ok(response.unwrap_or_default())
        })
    }

    fn cquery(&mut self, expr: &str) -> BoxFuture<'_, Result<CqueryResult>> {
        self.record(vec!["CQuery".to_string(), expr.to_string()]);
        let fail = *self.query_error.lock().unwrap();
        let response = self.cquery_responses.lock().unwrap().get(expr).cloned();
        Box::pin(async move {
            if fail {
                return Err(WatchbazelError::QueryFailed {
                    operation: "cquery".to_string(),
                    message: "scripted failure".to_string(),
                });
            }
            Ok(response.unwrap_or_default())
        })
    }

    fn info(&mut self) -> BoxFuture<'_, Result<HashMap<String, String>>> {
        self.record(vec!["Info".to_string()]);
        let info = self.info.lock().unwrap().clone();
        Box::pin(async move { Ok(info) })
    }

    fn build(&mut self, targets: Vec<String>) -> BoxFuture<'_, (OutputBuffer, Result<()>)> {
        let mut action = vec!["Build".to_string()];
        action.extend(targets.clone());
        self.record(action);
        let outcome = self.command_outcome("build");
        Box::pin(async move { outcome })
    }

    fn test(&mut self, targets: Vec<String>) -> BoxFuture<'_, (OutputBuffer, Result<()>)> {
        let mut action = vec!["Test".to_string()];
        action.extend(targets.clone());
        self.record(action);
        let outcome = self.command_outcome("test");
        Box::pin(async move { outcome })
    }
}
