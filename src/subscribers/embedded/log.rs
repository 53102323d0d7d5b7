//! # LogWriter — renders master events through `tracing`
//!
//! ## Example output (compact format)
//! ```text
//! INFO pipevisor::log: worker spawned role=center worker_id=1 pid=4711 attempt=0
//! WARN pipevisor::log: worker exited role=center worker_id=1 pid=4711 exit_code=1
//! INFO pipevisor::log: signal raised signal=stop_left
//! INFO pipevisor::log: workers unblocked count=3 signal=stop_all
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let role = e.role.map(|r| r.as_str()).unwrap_or("-");
        let signal = e.signal.map(|s| s.as_str()).unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::WorkerSpawned => tracing::info!(
                target: "pipevisor::log",
                role, worker_id = e.worker_id, pid = e.pid, attempt = e.attempt,
                "worker spawned"
            ),
            EventKind::WorkerExited if e.exit_code == Some(0) => tracing::info!(
                target: "pipevisor::log",
                role, worker_id = e.worker_id, pid = e.pid,
                "worker exited"
            ),
            EventKind::WorkerExited => tracing::warn!(
                target: "pipevisor::log",
                role, worker_id = e.worker_id, pid = e.pid, exit_code = e.exit_code, reason,
                "worker exited"
            ),
            EventKind::RespawnSkipped => tracing::info!(
                target: "pipevisor::log",
                role, worker_id = e.worker_id, signal,
                "respawn skipped"
            ),
            EventKind::SpawnFailed => tracing::error!(
                target: "pipevisor::log",
                role, worker_id = e.worker_id, reason,
                "spawn failed"
            ),
            EventKind::SignalRaised => {
                tracing::info!(target: "pipevisor::log", signal, "signal raised")
            }
            EventKind::RestartRequested => {
                tracing::info!(target: "pipevisor::log", "restart requested")
            }
            EventKind::StopRequested => {
                tracing::info!(target: "pipevisor::log", "stop requested")
            }
            EventKind::WorkersUnblocked => tracing::info!(
                target: "pipevisor::log",
                count = e.count, signal,
                "workers unblocked"
            ),
            EventKind::MasterExiting => tracing::info!(
                target: "pipevisor::log",
                alive = e.count, reason,
                "master exiting"
            ),
            EventKind::SubscriberOverflow => {
                tracing::warn!(target: "pipevisor::log", reason, "subscriber overflow")
            }
            EventKind::SubscriberPanicked => {
                tracing::error!(target: "pipevisor::log", reason, "subscriber panicked")
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
