//! # pipevisor
//!
//! **Pipevisor** runs a three-stage pipeline of worker processes under one
//! supervising master.
//!
//! Producers (*left*) push messages to an input queue, transformers (*center*)
//! pop them and push results to an output queue, and sinks (*right*) consume
//! those. The master forks every worker, replaces workers as they exit, and
//! coordinates graceful stop and restart through one shared control signal.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                      ┌──────────────────────────────────────────┐
//!                      │  Supervisor (master process)             │
//!                      │  - ProcessPool (pid → role, worker id)   │
//!                      │  - SignalCell (shared control signal)    │
//!                      │  - drains (restart / stop, per tick)     │
//!                      │  - Bus → SubscriberSet                   │
//!                      └──┬────────────────┬───────────────────┬──┘
//!                   fork  │          fork  │             fork  │
//!                         ▼                ▼                   ▼
//!                  ┌────────────┐   ┌─────────────┐     ┌─────────────┐
//!                  │ left  × L  │   │ center × C  │     │ right × R   │
//!                  │ left_start │   │ center_msg  │     │ right_msg   │
//!                  └─────┬──────┘   └──▲───────┬──┘     └──────▲──────┘
//!                        │ push        │ pop   │ push          │ pop
//!                        ▼             │       ▼               │
//!                  ┌───────────────────┴┐   ┌──────────────────┴─┐
//!                  │ input queue        │   │ output queue       │
//!                  └────────────────────┘   └────────────────────┘
//! ```
//!
//! ### Control signal
//! ```text
//! None ──SIGUSR1──► Restart                         (daemon only)
//!  │
//!  ├──SIGTERM────► StopLeft ──queues empty──► StopAll
//!  │                                           ▲
//!  └──non-daemon─► FinishLeft ──queues empty───┘
//! ```
//! The value only ever moves forward. Workers poll it through
//! [`Worker::should_stop`] and the master consults it before every respawn.
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                          |
//! |-------------------|--------------------------------------------------------------|---------------------------------------------|
//! | **Supervision**   | Fork, reap, respawn, drain                                   | [`Supervisor`], [`SupervisorBuilder`]       |
//! | **Callbacks**     | Per-role handlers run inside workers                         | [`Callbacks`], [`Hook`], [`Worker`]         |
//! | **Queues**        | Inter-process message queues with file spillover             | [`Queue`], [`Message`], [`Transport`]       |
//! | **Subscriber API**| Observe pool and control events                              | [`Subscribe`], [`Event`]                    |
//! | **Policies**      | Backoff before a failed worker exits                         | [`BackoffPolicy`], [`JitterPolicy`]         |
//! | **Errors**        | Typed errors for the master, the queues and the workers      | [`PipelineError`], [`QueueError`], [`WorkerError`] |
//! | **Configuration** | Counts, mode flags, queue name, tick                         | [`PipelineConfig`], [`Mode`]                |
//!
//! ## Optional features
//! - `logging`: exports the built-in [`LogWriter`] subscriber.
//!
//! ## Example
//! ```no_run
//! use pipevisor::{Message, Mode, PipelineConfig, Supervisor};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = PipelineConfig {
//!         mode: Mode::ASSEMBLY_LINE,
//!         center_process: 2,
//!         right_process: 1,
//!         queue_name: "lines".into(),
//!         ..PipelineConfig::default()
//!     };
//!
//!     Supervisor::builder(cfg)
//!         .on_left_start(|w| {
//!             for line in ["a b", "c d e"] {
//!                 w.input_queue().push_wait(&Message::from(line))?;
//!             }
//!             Ok(())
//!         })
//!         .on_center_message(|w, msg| {
//!             let words = msg.as_str().unwrap_or_default().split_whitespace().count();
//!             w.output_queue().push_wait(&Message::json(&words)?)?;
//!             Ok(())
//!         })
//!         .on_right_message(|_, msg| {
//!             let words: usize = msg.decode_json()?;
//!             println!("{words}");
//!             Ok(())
//!         })
//!         .build()?
//!         .run()?;
//!     Ok(())
//! }
//! ```

mod control;
mod core;
mod error;
mod events;
pub mod logging;
mod policies;
mod queue;
mod subscribers;
mod workers;

// ---- Public re-exports ----

pub use control::{ControlSignal, SignalCell};
pub use core::{
    DrainStep, DrainView, ForkSpawner, Mode, Outcome, PipelineConfig, PoolEntry, ProcessPool,
    RestartDrain, RunReport, Slot, Spawn, StopDrain, Supervisor, SupervisorBuilder, Termination,
    reap_exited,
};
pub use error::{PipelineError, QueueError, WorkerError};
pub use events::{Bus, Event, EventKind};
pub use policies::{BackoffPolicy, JitterPolicy};
#[cfg(target_os = "linux")]
pub use queue::{SysvTransport, open_pair, queue_key};
pub use queue::{Message, Queue, SpillSettings, Transport};
pub use subscribers::{Subscribe, SubscriberSet};
pub use workers::{
    Callbacks, EXIT_CLEAN, ErrorReporter, Finish, Handler, Hook, MessageFn, Role, RunSettings,
    StartFn, TracingReporter, Worker, WorkerContext, run_worker,
};

// Optional: expose a simple built-in logger subscriber.
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
