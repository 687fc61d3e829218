// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};

/// Command-line arguments for `watchbazel`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "watchbazel",
    version,
    about = "Re-run bazel commands when the files behind your targets change.",
    long_about = None
)]
pub struct CliArgs {
    /// Path of the bazel binary to drive.
    #[arg(long, value_name = "PATH", default_value = "bazel")]
    pub bazel_path: String,

    /// Quiet period after the last change before re-running, in milliseconds.
    #[arg(long, value_name = "MS", default_value_t = 100)]
    pub debounce: u64,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `WATCHBAZEL_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Startup argument passed to bazel before the subcommand (repeatable).
    #[arg(long = "bazel-startup-arg", value_name = "ARG")]
    pub startup_args: Vec<String>,

    /// Argument passed to bazel after the subcommand (repeatable).
    #[arg(long = "bazel-arg", value_name = "ARG")]
    pub bazel_args: Vec<String>,

    /// Search command output for runnable commands and execute them.
    #[arg(long)]
    pub run_output: bool,

    /// Prompt before executing commands found in command output.
    #[arg(long, action = ArgAction::Set, default_value_t = true, value_name = "BOOL")]
    pub run_output_interactive: bool,

    /// Append each run target's subprocess output to a per-target file under
    /// the scratch directory.
    #[arg(long)]
    pub run_log_to_files: bool,

    #[command(subcommand)]
    pub command: VerbArgs,
}

/// The bazel operation to repeat on every change.
#[derive(Debug, Clone, Subcommand)]
pub enum VerbArgs {
    /// Build targets, rebuilding whenever their inputs change.
    Build {
        #[arg(required = true, value_name = "TARGET")]
        targets: Vec<String>,
    },
    /// Test targets, retesting whenever their inputs change.
    Test {
        #[arg(required = true, value_name = "TARGET")]
        targets: Vec<String>,
    },
    /// Run targets, restarting (or notifying) their subprocesses on change.
    Run {
        #[arg(required = true, value_name = "TARGET")]
        targets: Vec<String>,

        /// Arguments forwarded to the executed binary.
        #[arg(last = true, value_name = "ARG")]
        args: Vec<String>,
    },
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
