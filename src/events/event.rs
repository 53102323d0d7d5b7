//! # Runtime events emitted by the master.
//!
//! The [`EventKind`] enum covers three groups:
//! - **Pool events**: workers spawned, exited, not replaced, failed to spawn
//! - **Control events**: drain requests, signal escalations, sentinels pushed, master exit
//! - **Subscriber events**: overflow and panics inside subscribers
//!
//! Workers do not publish events; they live in other processes. The master
//! learns about them from wait statuses.
//!
//! ## Ordering guarantees
//! Each event has a process-wide sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use pipevisor::{Event, EventKind, Role};
//!
//! let ev = Event::new(EventKind::WorkerExited)
//!     .with_role(Role::Center)
//!     .with_worker_id(2)
//!     .with_pid(4242)
//!     .with_exit_code(1);
//!
//! assert_eq!(ev.kind, EventKind::WorkerExited);
//! assert_eq!(ev.role, Some(Role::Center));
//! assert_eq!(ev.exit_code, Some(1));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::control::ControlSignal;
use crate::workers::Role;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Pool events ===
    /// A worker process was forked.
    ///
    /// Sets: `role`, `worker_id`, `pid`, `attempt` (slot failure streak).
    WorkerSpawned,

    /// A worker process was reaped.
    ///
    /// Sets: `role`, `worker_id`, `pid`, and `exit_code` or `reason` (`"signal SIGKILL"`).
    WorkerExited,

    /// A reaped worker was not replaced because of the current control signal.
    ///
    /// Sets: `role`, `worker_id`, `signal`.
    RespawnSkipped,

    /// `fork` failed while starting or replacing a worker.
    ///
    /// Sets: `role`, `worker_id`, `reason`.
    SpawnFailed,

    // === Control events ===
    /// The control signal moved to a new value.
    ///
    /// Sets: `signal`.
    SignalRaised,

    /// SIGUSR1 observed: smooth restart started.
    RestartRequested,

    /// SIGTERM/SIGINT observed (or non-daemon run started): graceful stop started.
    StopRequested,

    /// Empty sentinels were pushed to wake consumers parked on a queue pop.
    ///
    /// Sets: `count` (sentinels pushed), `signal`.
    WorkersUnblocked,

    /// The master is leaving its event loop.
    ///
    /// Sets: `count` (workers still alive), `reason` (`"stopped"` or `"restarted"`).
    MasterExiting,

    // === Subscriber events ===
    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `reason` (`"subscriber=<name> reason=<full|closed>"`).
    SubscriberOverflow,

    /// Subscriber panicked during event processing.
    ///
    /// Sets: `reason` (panic info).
    SubscriberPanicked,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Role of the worker concerned.
    pub role: Option<Role>,
    /// Worker id within its role.
    pub worker_id: Option<usize>,
    /// Process id of the worker concerned.
    pub pid: Option<i32>,
    /// Exit code of a reaped worker.
    pub exit_code: Option<i32>,
    /// Slot failure streak at spawn time.
    pub attempt: Option<u32>,
    /// Control signal relevant to the event.
    pub signal: Option<ControlSignal>,
    /// Counter payload (sentinels pushed, workers left).
    pub count: Option<usize>,
    /// Human-readable detail.
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            role: None,
            worker_id: None,
            pid: None,
            exit_code: None,
            attempt: None,
            signal: None,
            count: None,
            reason: None,
        }
    }

    #[inline]
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    #[inline]
    pub fn with_worker_id(mut self, id: usize) -> Self {
        self.worker_id = Some(id);
        self
    }

    #[inline]
    pub fn with_pid(mut self, pid: i32) -> Self {
        self.pid = Some(pid);
        self
    }

    #[inline]
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    #[inline]
    pub fn with_signal(mut self, signal: ControlSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    #[inline]
    pub fn with_count(mut self, n: usize) -> Self {
        self.count = Some(n);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} info={info}"))
    }

    #[inline]
    pub fn is_subscriber_event(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}
