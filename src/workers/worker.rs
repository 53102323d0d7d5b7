use std::fmt;
use std::sync::Arc;

use nix::unistd::Pid;

use super::Role;
use crate::control::{ControlSignal, SignalCell};
use crate::queue::Queue;

/// Handle passed to every callback.
///
/// Gives the callback its identity inside the pipeline, both queues, and a
/// view of the shared control signal. Long-running left callbacks should poll
/// [`Worker::should_stop`] and return once it turns `true`.
pub struct Worker {
    role: Role,
    worker_id: usize,
    master_pid: Pid,
    pid: Pid,
    name: Arc<str>,
    signal: SignalCell,
    input: Queue,
    output: Queue,
}

impl Worker {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        role: Role,
        worker_id: usize,
        master_pid: Pid,
        pid: Pid,
        name: Arc<str>,
        signal: SignalCell,
        input: Queue,
        output: Queue,
    ) -> Self {
        Self {
            role,
            worker_id,
            master_pid,
            pid,
            name,
            signal,
            input,
            output,
        }
    }

    /// Stage this worker runs.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Index of this worker within its role (`0..count`).
    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    /// Pid of the supervising master.
    pub fn master_pid(&self) -> Pid {
        self.master_pid
    }

    /// Pid of this worker process.
    pub fn worker_pid(&self) -> Pid {
        self.pid
    }

    /// Pipeline name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current control signal (snapshot).
    pub fn signal(&self) -> ControlSignal {
        self.signal.get()
    }

    /// Whether this worker should wind down at its next safe point.
    ///
    /// Left workers stop on any drain signal; center and right workers only on
    /// `Restart` or `StopAll`.
    pub fn should_stop(&self) -> bool {
        self.signal.get().stops(self.role)
    }

    /// Queue between left and center.
    pub fn input_queue(&self) -> &Queue {
        &self.input
    }

    /// Queue between center and right.
    pub fn output_queue(&self) -> &Queue {
        &self.output
    }

    /// Queue this worker consumes, if it consumes one.
    pub(crate) fn consumed_queue(&self) -> Option<&Queue> {
        match self.role {
            Role::Left => None,
            Role::Center => Some(&self.input),
            Role::Right => Some(&self.output),
        }
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("role", &self.role)
            .field("worker_id", &self.worker_id)
            .field("pid", &self.pid)
            .field("master_pid", &self.master_pid)
            .finish_non_exhaustive()
    }
}
