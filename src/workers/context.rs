use std::sync::Arc;

use nix::unistd::Pid;

use super::{Callbacks, ErrorReporter, Role, Worker};
use crate::control::SignalCell;
use crate::policies::BackoffPolicy;
use crate::queue::Queue;

/// Per-run knobs shared by every worker.
#[derive(Clone, Debug)]
pub struct RunSettings {
    /// Upper bound on loop iterations for center and right workers. Empty pops count.
    pub max_executions: u64,
    /// Daemon mode: left workers also back off after a failure.
    pub daemon: bool,
    /// Sleep before a failed worker exits.
    pub failure_backoff: BackoffPolicy,
}

/// Everything a worker process needs, handed to [`run_worker`](crate::run_worker).
#[derive(Clone)]
pub struct WorkerContext {
    /// Stage to run.
    pub role: Role,
    /// Index within the role.
    pub worker_id: usize,
    /// Consecutive failures of this slot before this spawn (0 after a clean exit).
    pub attempt: u32,
    /// Pid of the master.
    pub master_pid: Pid,
    /// Pipeline name.
    pub name: Arc<str>,
    /// Left → center queue.
    pub input: Queue,
    /// Center → right queue.
    pub output: Queue,
    /// Shared control signal.
    pub signal: SignalCell,
    /// User callbacks.
    pub callbacks: Arc<Callbacks>,
    /// Failure sink.
    pub reporter: Arc<dyn ErrorReporter>,
    /// Loop budget, daemon flag, failure backoff.
    pub settings: RunSettings,
}

impl WorkerContext {
    /// Builds the callback handle for the current process.
    pub(crate) fn worker(&self) -> Worker {
        Worker::new(
            self.role,
            self.worker_id,
            self.master_pid,
            nix::unistd::getpid(),
            Arc::clone(&self.name),
            self.signal.clone(),
            self.input.clone(),
            self.output.clone(),
        )
    }
}
