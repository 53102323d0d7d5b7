//! # OS signals consumed by the master.
//!
//! | signal  | meaning                     | registered        |
//! |---------|-----------------------------|-------------------|
//! | SIGCHLD | reap and respawn            | always            |
//! | SIGTERM | graceful stop               | always            |
//! | SIGINT  | graceful stop (Ctrl-C)      | always            |
//! | SIGUSR1 | smooth restart              | daemon mode only  |
//!
//! Streams are registered before the first worker is forked, so an early
//! child exit cannot be missed.

use tokio::signal::unix::{Signal, SignalKind, signal};

/// A signal the master reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MasterSignal {
    /// SIGCHLD.
    ChildExited,
    /// SIGUSR1.
    Restart,
    /// SIGTERM or SIGINT.
    Stop,
}

/// Registered signal streams.
pub struct MasterSignals {
    child: Signal,
    terminate: Signal,
    interrupt: Signal,
    restart: Option<Signal>,
}

impl MasterSignals {
    /// Registers the streams. SIGUSR1 only when `daemon` is set.
    ///
    /// Must run inside a tokio runtime with the IO driver enabled.
    pub fn register(daemon: bool) -> std::io::Result<Self> {
        Ok(Self {
            child: signal(SignalKind::child())?,
            terminate: signal(SignalKind::terminate())?,
            interrupt: signal(SignalKind::interrupt())?,
            restart: if daemon {
                Some(signal(SignalKind::user_defined1())?)
            } else {
                None
            },
        })
    }

    /// Waits for the next signal.
    pub async fn recv(&mut self) -> MasterSignal {
        let restart = self.restart.as_mut();
        let restart = async move {
            match restart {
                Some(s) => s.recv().await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = self.child.recv() => MasterSignal::ChildExited,
            _ = self.terminate.recv() => MasterSignal::Stop,
            _ = self.interrupt.recv() => MasterSignal::Stop,
            _ = restart => MasterSignal::Restart,
        }
    }
}
