//! Worker-side execution contract.
//!
//! Everything in this module runs inside a forked worker process, never in the
//! master.
//!
//! ## Contents
//! - [`Role`] left / center / right
//! - [`Callbacks`], [`Hook`], [`Handler`] user handler slots
//! - [`Worker`] handle passed to every callback
//! - [`WorkerContext`], [`RunSettings`] entry point arguments
//! - [`run_worker`] the entry point; returns the process exit code
//! - [`ErrorReporter`], [`TracingReporter`] failure sink at the process boundary

mod callbacks;
mod context;
mod entry;
mod reporter;
mod role;
mod worker;

pub use callbacks::{Callbacks, Handler, Hook, MessageFn, StartFn};
pub use context::{RunSettings, WorkerContext};
pub use entry::{EXIT_CLEAN, Finish, run_worker};
pub use reporter::{ErrorReporter, TracingReporter};
pub use role::Role;
pub use worker::Worker;
