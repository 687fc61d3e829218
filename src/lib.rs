// src/lib.rs

pub mod bazel;
pub mod cli;
pub mod command;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod lifecycle;
pub mod logging;
pub mod types;
pub mod watch;
pub mod workspace;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::bazel::{Bazel, BazelCli, BazelFactory};
use crate::cli::{CliArgs, VerbArgs};
use crate::command::{
    Command, CommandFactory, DefaultCommand, NotifyCommand, ProcessRegistry,
};
use crate::engine::{
    spawn_os_signal_forwarder, spawn_signal_task, Engine, EngineDeps, EngineOptions, Sig,
    SignalHandler,
};
use crate::errors::Result;
use crate::fs::{FileSystem, RealFileSystem};
use crate::lifecycle::{Lifecycle, OutputRunner};
use crate::watch::NotifyWatcher;
use crate::workspace::{MainWorkspaceFinder, WorkspaceFinder};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - the bazel client and command-handle factories
/// - both watcher facades (source files, build files)
/// - the lifecycle listener list
/// - the signal task
/// - the engine, handed to the requested verb's loop
pub async fn run(args: CliArgs) -> Result<()> {
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let workspace: Arc<dyn WorkspaceFinder> = Arc::new(MainWorkspaceFinder::new(fs.clone()));

    let bazel_path = PathBuf::from(&args.bazel_path);
    let bazel_factory: BazelFactory = {
        let bazel_path = bazel_path.clone();
        Arc::new(move || Box::new(BazelCli::new(bazel_path.clone())) as Box<dyn Bazel>)
    };

    let default_command: CommandFactory = {
        let bazel_path = bazel_path.clone();
        Arc::new(move |spec| Box::new(DefaultCommand::new(bazel_path.clone(), spec)) as Box<dyn Command>)
    };
    let notify_command: CommandFactory = {
        let bazel_path = bazel_path.clone();
        let bazel_factory = bazel_factory.clone();
        Arc::new(move |spec| {
            Box::new(NotifyCommand::new(
                bazel_path.clone(),
                spec,
                bazel_factory.clone(),
            )) as Box<dyn Command>
        })
    };

    let (source_watcher, source_events) = NotifyWatcher::new()?;
    let (build_watcher, build_events) = NotifyWatcher::new()?;

    let listeners: Vec<Box<dyn Lifecycle>> = vec![Box::new(OutputRunner::new(
        args.run_output,
        args.run_output_interactive,
        workspace.clone(),
    ))];

    // Signal task: tears down managed subprocesses and exits the process.
    let registry = ProcessRegistry::default();
    let (sig_tx, sig_rx) = mpsc::channel::<Sig>(1);
    spawn_os_signal_forwarder(sig_tx.clone())?;
    let handler = SignalHandler::new(
        registry.clone(),
        Box::new(|code| std::process::exit(code)),
    );
    spawn_signal_task(sig_rx, handler);

    let opts = EngineOptions {
        debounce: Duration::from_millis(args.debounce),
        run_log_to_files: args.run_log_to_files,
        ..Default::default()
    };

    let deps = EngineDeps {
        bazel_factory,
        default_command,
        notify_command,
        fs,
        workspace,
        source_watcher: Box::new(source_watcher),
        source_events,
        build_watcher: Box::new(build_watcher),
        build_events,
        listeners,
        registry,
        sig_tx,
    };

    let mut engine = Engine::new(deps, opts);
    engine.set_startup_args(args.startup_args.clone());
    engine.set_bazel_args(args.bazel_args.clone());

    match args.command {
        VerbArgs::Build { targets } => engine.build(targets).await,
        VerbArgs::Test { targets } => engine.test(targets).await,
        VerbArgs::Run { targets, args } => engine.run(targets, args).await,
    }
}
