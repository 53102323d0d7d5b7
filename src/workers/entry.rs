//! # Worker entry point.
//!
//! [`run_worker`] is what a freshly forked child executes. It never returns an
//! error: every failure is caught here, handed to the reporter, and turned into
//! the process exit code.
//!
//! ## Flow
//! ```text
//! left:            left_start ── Ok ─► exit 0
//!                            └─ Err ─► (daemon: backoff) ─► report ─► exit 1|2
//!
//! center / right:  *_start (optional) ── Err ─► (daemon: backoff) ─► report ─► exit 1|2
//!                  repeat max_executions times:
//!                    ├─ signal is Restart|StopAll ─► exit 0
//!                    ├─ pop() == sentinel         ─► next iteration
//!                    └─ *_message(msg)
//!                         └─ Err ─► requeue msg ─► backoff ─► report ─► exit 1|2
//!                  budget exhausted ─► exit 0
//! ```
//!
//! Nothing is retried inside the process. The master replaces the worker.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use super::{Hook, Role, Worker, WorkerContext};
use crate::error::{QueueError, WorkerError};
use crate::queue::{Message, Queue};

/// Exit code of a worker that finished without a failure.
pub const EXIT_CLEAN: i32 = 0;

/// How a worker finished without failing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Finish {
    /// Left worker body returned.
    Completed,
    /// Center/right loop ran `max_executions` iterations.
    BudgetExhausted,
    /// Center/right loop saw `Restart` or `StopAll`.
    Signalled,
}

/// Runs one worker to completion and returns its process exit code.
pub fn run_worker(ctx: WorkerContext) -> i32 {
    let worker = ctx.worker();
    let _span = tracing::info_span!(
        "worker",
        role = %ctx.role,
        worker_id = ctx.worker_id,
        pid = %worker.worker_pid()
    )
    .entered();

    match drive(&ctx, &worker) {
        Ok(finish) => {
            tracing::debug!(?finish, "worker finished");
            EXIT_CLEAN
        }
        Err(err) => {
            ctx.reporter.report(&err, err.is_fatal());
            err.exit_code()
        }
    }
}

fn drive(ctx: &WorkerContext, worker: &Worker) -> Result<Finish, WorkerError> {
    match ctx.role {
        Role::Left => produce(ctx, worker),
        Role::Center | Role::Right => consume(ctx, worker),
    }
}

fn produce(ctx: &WorkerContext, worker: &Worker) -> Result<Finish, WorkerError> {
    let Some(start) = ctx.callbacks.left_start.as_ref() else {
        return Err(WorkerError::MissingHandler {
            role: Role::Left,
            worker_id: ctx.worker_id,
            hook: Hook::LeftStart,
        });
    };

    guard(ctx, || start(worker)).map_err(|err| {
        if ctx.settings.daemon {
            back_off(ctx);
        }
        err
    })?;
    Ok(Finish::Completed)
}

fn consume(ctx: &WorkerContext, worker: &Worker) -> Result<Finish, WorkerError> {
    let Some(queue) = worker.consumed_queue() else {
        return Ok(Finish::Completed);
    };

    if let Some(start) = ctx.callbacks.start_for(ctx.role) {
        guard(ctx, || start(worker)).map_err(|err| {
            if ctx.settings.daemon {
                back_off(ctx);
            }
            err
        })?;
    }

    for _ in 0..ctx.settings.max_executions {
        if ctx.signal.get().stops_all() {
            return Ok(Finish::Signalled);
        }

        let Some(msg) = queue.pop().map_err(|source| queue_error(ctx, source))? else {
            continue;
        };

        let Some(handler) = ctx.callbacks.message_for(ctx.role) else {
            requeue(queue, &msg);
            return Err(WorkerError::MissingHandler {
                role: ctx.role,
                worker_id: ctx.worker_id,
                // consuming roles always have a required hook
                hook: Hook::required_for(ctx.role).unwrap_or(Hook::CenterMessage),
            });
        };

        if let Err(err) = guard(ctx, || handler(worker, &msg)) {
            requeue(queue, &msg);
            back_off(ctx);
            return Err(err);
        }
    }

    Ok(Finish::BudgetExhausted)
}

/// Runs one callback, turning errors and panics into [`WorkerError`].
fn guard(
    ctx: &WorkerContext,
    f: impl FnOnce() -> anyhow::Result<()>,
) -> Result<(), WorkerError> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(error)) => Err(WorkerError::Callback {
            role: ctx.role,
            worker_id: ctx.worker_id,
            error,
        }),
        Err(payload) => Err(WorkerError::Panicked {
            role: ctx.role,
            worker_id: ctx.worker_id,
            info: panic_message(payload.as_ref()),
        }),
    }
}

/// Puts a message back at the tail of the queue it came from.
fn requeue(queue: &Queue, msg: &Message) {
    if let Err(error) = queue.push_wait(msg) {
        tracing::error!(%error, len = msg.len(), "failed to requeue message, it is lost");
    }
}

fn back_off(ctx: &WorkerContext) {
    let delay = ctx.settings.failure_backoff.next(ctx.attempt);
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}

fn queue_error(ctx: &WorkerContext, source: QueueError) -> WorkerError {
    WorkerError::Queue {
        role: ctx.role,
        worker_id: ctx.worker_id,
        source,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
