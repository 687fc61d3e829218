use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use watchbazel::command::{Command, CommandFactory, CommandSpec, LogSink, SharedProcess};
use watchbazel::errors::Result;
use watchbazel::types::{BoxFuture, OutputBuffer};

/// Call counts recorded by a [`FakeCommand`].
#[derive(Debug, Clone, Default)]
pub struct FakeCommandState {
    pub start_calls: u32,
    pub notify_calls: u32,
    pub before_rebuild_calls: u32,
    pub terminate_calls: u32,
}

/// Command handle that records calls instead of spawning anything.
#[derive(Clone, Default)]
pub struct FakeCommand {
    state: Arc<Mutex<FakeCommandState>>,
    running: Arc<Mutex<bool>>,
    proc: SharedProcess,
}

impl FakeCommand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> FakeCommandState {
        self.state.lock().unwrap().clone()
    }

    pub fn set_running(&self, running: bool) {
        *self.running.lock().unwrap() = running;
    }
}

impl Command for FakeCommand {
    fn start(&mut self, _log: Option<LogSink>) -> BoxFuture<'_, Result<OutputBuffer>> {
        {
            let mut state = self.state.lock().unwrap();
            assert_eq!(state.start_calls, 0, "command started twice");
            state.start_calls += 1;
        }
        *self.running.lock().unwrap() = true;
        Box::pin(async { Ok(OutputBuffer::default()) })
    }

    fn before_rebuild(&mut self) -> BoxFuture<'_, ()> {
        self.state.lock().unwrap().before_rebuild_calls += 1;
        Box::pin(async {})
    }

    fn notify_of_changes(&mut self, _log: Option<LogSink>) -> BoxFuture<'_, OutputBuffer> {
        self.state.lock().unwrap().notify_calls += 1;
        Box::pin(async { OutputBuffer::default() })
    }

    fn terminate(&mut self) {
        self.state.lock().unwrap().terminate_calls += 1;
        *self.running.lock().unwrap() = false;
    }

    fn is_running(&self) -> bool {
        *self.running.lock().unwrap()
    }

    fn process(&self) -> SharedProcess {
        self.proc.clone()
    }
}

/// Factory that creates one [`FakeCommand`] per target and remembers them.
#[derive(Clone, Default)]
pub struct FakeCommandFactory {
    created: Arc<Mutex<HashMap<String, FakeCommand>>>,
    specs: Arc<Mutex<Vec<CommandSpec>>>,
}

impl FakeCommandFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn factory(&self) -> CommandFactory {
        let this = self.clone();
        Arc::new(move |spec| {
            let cmd = FakeCommand::new();
            this.created
                .lock()
                .unwrap()
                .insert(spec.target.clone(), cmd.clone());
            this.specs.lock().unwrap().push(spec);
            Box::new(cmd) as Box<dyn Command>
        })
    }

    pub fn get(&self, target: &str) -> Option<FakeCommand> {
        self.created.lock().unwrap().get(target).cloned()
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    pub fn specs(&self) -> Vec<CommandSpec> {
        self.specs.lock().unwrap().clone()
    }
}
