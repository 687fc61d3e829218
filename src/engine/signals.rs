// src/engine/signals.rs

//! Signal handling: bridges OS termination signals into subprocess teardown
//! and process exit.
//!
//! A dedicated task consumes a signals channel so teardown can preempt the
//! engine in any phase. The engine itself also sends into the channel when it
//! needs to shut the process down (rule query failure in run mode).

use tokio::sync::mpsc;
use tracing::{error, info};

use crate::command::ProcessRegistry;
use crate::errors::Result;

/// Exit code for any signal-driven termination.
pub const SIGNAL_EXIT_CODE: i32 = 3;

/// Signals recognised by the handler. Anything else arriving here would be a
/// registration bug in the forwarder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sig {
    Interrupt,
    Terminate,
    Hangup,
}

/// Process-exit seam, injectable so tests can observe exits instead of dying.
pub type ExitFn = Box<dyn FnMut(i32) + Send>;

pub struct SignalHandler {
    procs: ProcessRegistry,
    exit: ExitFn,
    interrupt_count: u32,
}

impl SignalHandler {
    pub fn new(procs: ProcessRegistry, exit: ExitFn) -> Self {
        Self {
            procs,
            exit,
            interrupt_count: 0,
        }
    }

    pub fn interrupt_count(&self) -> u32 {
        self.interrupt_count
    }

    /// Handle one signal.
    ///
    /// An interrupt first tears down running subprocesses and gives the user
    /// the chance to interrupt again; with nothing left running it exits.
    /// Terminate and hangup always exit. The third interrupt exits no matter
    /// what.
    pub fn handle(&mut self, sig: Sig) {
        match sig {
            Sig::Interrupt => {
                let any_running = self.procs.terminate_all();
                if any_running {
                    info!("subprocess killed (interrupt again to stop watchbazel)");
                } else {
                    (self.exit)(SIGNAL_EXIT_CODE);
                }
            }
            Sig::Terminate | Sig::Hangup => {
                if self.procs.terminate_all() {
                    info!(signal = ?sig, "subprocess killed");
                }
                (self.exit)(SIGNAL_EXIT_CODE);
                return;
            }
        }

        self.interrupt_count += 1;
        if self.interrupt_count > 2 {
            error!("exiting after three interrupts");
            (self.exit)(SIGNAL_EXIT_CODE);
        }
    }
}

/// Consume signals until the channel closes.
pub fn spawn_signal_task(
    mut rx: mpsc::Receiver<Sig>,
    mut handler: SignalHandler,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(sig) = rx.recv().await {
            handler.handle(sig);
        }
    })
}

/// Forward SIGINT, SIGTERM, and SIGHUP into the signals channel.
#[cfg(unix)]
pub fn spawn_os_signal_forwarder(tx: mpsc::Sender<Sig>) -> Result<tokio::task::JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;

    Ok(tokio::spawn(async move {
        loop {
            let sig = tokio::select! {
                _ = interrupt.recv() => Sig::Interrupt,
                _ = terminate.recv() => Sig::Terminate,
                _ = hangup.recv() => Sig::Hangup,
            };
            if tx.send(sig).await.is_err() {
                break;
            }
        }
    }))
}

/// Ctrl-C is the only signal available off unix.
#[cfg(not(unix))]
pub fn spawn_os_signal_forwarder(tx: mpsc::Sender<Sig>) -> Result<tokio::task::JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                break;
            }
            if tx.send(Sig::Interrupt).await.is_err() {
                break;
            }
        }
    }))
}
