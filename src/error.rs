//! Error types used by the pipeline master and its workers.
//!
//! This module defines three error enums:
//!
//! - [`PipelineError`] — errors raised by the supervisor itself (master process).
//! - [`QueueError`] — failures of the inter-process queues.
//! - [`WorkerError`] — failures raised inside a worker process boundary.
//!
//! All of them provide `as_label` for logs/metrics. [`WorkerError`] also knows
//! which exit code its process terminates with and whether it counts as fatal.

use std::io;

use nix::errno::Errno;
use nix::unistd::Pid;
use thiserror::Error;

use crate::workers::{Hook, Role};

/// # Errors produced by the supervisor.
///
/// Only [`PipelineError::NoSuchPid`] can surface while the pipeline is running;
/// everything else is raised while building or starting it.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A reaped child is not in the process pool. This is an invariant violation.
    #[error("reboot process error: no such pid {pid}")]
    NoSuchPid {
        /// The process id that was reaped.
        pid: Pid,
    },

    /// The pool already tracks a live process with this id.
    #[error("pid {pid} already present in the process pool")]
    DuplicatePid {
        /// The conflicting process id.
        pid: Pid,
    },

    /// A role is configured with processes but its mandatory handler is unset.
    #[error("missing handler for {hook} ({role} processes configured)")]
    MissingHandler {
        /// The unset callback slot.
        hook: Hook,
        /// The role that needs it.
        role: Role,
    },

    /// Callback registration used a name that is not a known event.
    #[error("unknown event name {0:?}")]
    UnknownEvent(String),

    /// Configuration could not be parsed or is inconsistent.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// `fork` failed.
    #[error("failed to spawn worker process: {0}")]
    Spawn(#[source] Errno),

    /// The shared control-signal mapping could not be created.
    #[error("failed to map shared control signal: {0}")]
    SharedMemory(#[source] Errno),

    /// Queue creation failed.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// The master event loop could not be set up (runtime or signal streams).
    #[error("master runtime error: {0}")]
    Runtime(#[from] io::Error),
}

impl PipelineError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use nix::unistd::Pid;
    /// use pipevisor::PipelineError;
    ///
    /// let err = PipelineError::NoSuchPid { pid: Pid::from_raw(42) };
    /// assert_eq!(err.as_label(), "pipeline_no_such_pid");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            PipelineError::NoSuchPid { .. } => "pipeline_no_such_pid",
            PipelineError::DuplicatePid { .. } => "pipeline_duplicate_pid",
            PipelineError::MissingHandler { .. } => "pipeline_missing_handler",
            PipelineError::UnknownEvent(_) => "pipeline_unknown_event",
            PipelineError::Config(_) => "pipeline_config",
            PipelineError::Spawn(_) => "pipeline_spawn",
            PipelineError::SharedMemory(_) => "pipeline_shared_memory",
            PipelineError::Queue(_) => "pipeline_queue",
            PipelineError::Runtime(_) => "pipeline_runtime",
        }
    }
}

/// # Errors produced by the inter-process queues.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum QueueError {
    /// A queue system call failed.
    #[error("queue {op} failed: {errno}")]
    Sys {
        /// The failing operation (`msgget`, `msgsnd`, ...).
        op: &'static str,
        /// The OS error.
        errno: Errno,
    },

    /// A non-blocking push found the queue full.
    #[error("queue is full")]
    Full,

    /// Reading or writing a spill file failed.
    #[error("spill file error: {0}")]
    Io(#[from] io::Error),

    /// A received frame could not be decoded.
    #[error("malformed queue frame: {0}")]
    Frame(String),

    /// The frame does not fit in a single queue message.
    #[error("frame of {len} bytes exceeds the queue message limit of {max}")]
    TooLarge {
        /// Encoded frame length.
        len: usize,
        /// Transport limit.
        max: usize,
    },

    /// JSON payload helpers failed.
    #[error("payload json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QueueError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            QueueError::Sys { .. } => "queue_sys",
            QueueError::Full => "queue_full",
            QueueError::Io(_) => "queue_io",
            QueueError::Frame(_) => "queue_frame",
            QueueError::TooLarge { .. } => "queue_too_large",
            QueueError::Json(_) => "queue_json",
        }
    }
}

/// # Errors raised inside a worker process.
///
/// These never cross the process boundary as values: the worker reports them
/// through the [`ErrorReporter`](crate::ErrorReporter) and exits with
/// [`WorkerError::exit_code`].
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum WorkerError {
    /// A user callback returned an error.
    #[error("{role} #{worker_id} callback failed: {error:#}")]
    Callback {
        /// Role of the failing worker.
        role: Role,
        /// Worker id within the role.
        worker_id: usize,
        /// The callback's error.
        error: anyhow::Error,
    },

    /// A user callback panicked.
    #[error("{role} #{worker_id} callback panicked: {info}")]
    Panicked {
        /// Role of the failing worker.
        role: Role,
        /// Worker id within the role.
        worker_id: usize,
        /// Panic payload rendered as text.
        info: String,
    },

    /// The callback needed by this role was never registered.
    #[error("{role} #{worker_id} has no {hook} handler")]
    MissingHandler {
        /// Role of the worker.
        role: Role,
        /// Worker id within the role.
        worker_id: usize,
        /// The unset slot.
        hook: Hook,
    },

    /// Queue access failed outside of a callback.
    #[error("{role} #{worker_id} queue error: {source}")]
    Queue {
        /// Role of the worker.
        role: Role,
        /// Worker id within the role.
        worker_id: usize,
        /// The queue failure.
        source: QueueError,
    },
}

impl WorkerError {
    /// Exit code of a process terminated by this error.
    ///
    /// - `1` callback error
    /// - `2` callback panic
    /// - `3` setup or queue error
    pub fn exit_code(&self) -> i32 {
        match self {
            WorkerError::Callback { .. } => 1,
            WorkerError::Panicked { .. } => 2,
            WorkerError::MissingHandler { .. } | WorkerError::Queue { .. } => 3,
        }
    }

    /// Whether the failure is reported as fatal (panics only).
    pub fn is_fatal(&self) -> bool {
        matches!(self, WorkerError::Panicked { .. })
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkerError::Callback { .. } => "worker_callback_failed",
            WorkerError::Panicked { .. } => "worker_panicked",
            WorkerError::MissingHandler { .. } => "worker_missing_handler",
            WorkerError::Queue { .. } => "worker_queue",
        }
    }

    /// Role of the worker that raised the error.
    pub fn role(&self) -> Role {
        match self {
            WorkerError::Callback { role, .. }
            | WorkerError::Panicked { role, .. }
            | WorkerError::MissingHandler { role, .. }
            | WorkerError::Queue { role, .. } => *role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_exit_codes_are_distinct_per_class() {
        let callback = WorkerError::Callback {
            role: Role::Center,
            worker_id: 0,
            error: anyhow::anyhow!("boom"),
        };
        let panicked = WorkerError::Panicked {
            role: Role::Right,
            worker_id: 1,
            info: "oops".into(),
        };
        let missing = WorkerError::MissingHandler {
            role: Role::Center,
            worker_id: 2,
            hook: Hook::CenterMessage,
        };

        assert_eq!(callback.exit_code(), 1);
        assert_eq!(panicked.exit_code(), 2);
        assert_eq!(missing.exit_code(), 3);
        assert!(panicked.is_fatal());
        assert!(!callback.is_fatal());
    }

    #[test]
    fn callback_error_message_names_role_and_worker() {
        let err = WorkerError::Callback {
            role: Role::Center,
            worker_id: 3,
            error: anyhow::anyhow!("connection refused"),
        };
        let msg = err.to_string();
        assert!(msg.contains("center #3"));
        assert!(msg.contains("connection refused"));
        assert_eq!(err.role(), Role::Center);
    }

    #[test]
    fn no_such_pid_label_and_message() {
        let err = PipelineError::NoSuchPid {
            pid: Pid::from_raw(77),
        };
        assert_eq!(err.as_label(), "pipeline_no_such_pid");
        assert!(err.to_string().contains("77"));
    }
}
