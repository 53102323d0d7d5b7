//! # Worker process creation.
//!
//! [`Spawn`] is the seam between the pool logic and the OS. [`ForkSpawner`]
//! forks the master; the child never returns into the master's code.
//!
//! ## Child setup
//! ```text
//! fork()
//!  └─ child:
//!       reset SIGCHLD/SIGTERM/SIGINT/SIGUSR1/SIGQUIT to default
//!       set process title "<role>#<id> <name>"
//!       code = run_worker(ctx) on a new thread
//!       exit(code)
//! ```
//! The reset matters: the master's signal handlers are inherited across
//! `fork`, and a worker must die on SIGTERM instead of forwarding it into a
//! runtime that no longer runs.
//!
//! The fork happens inside the master's tokio runtime, and the forking thread
//! still carries the runtime's thread-local context in the child. The worker
//! body therefore runs on a thread of its own, where callbacks are free to
//! build and block on their own runtime.

use std::sync::Arc;
use std::thread;

use nix::sys::signal::{SigHandler, Signal, signal};
use nix::unistd::{ForkResult, Pid, fork};

use super::pool::Slot;
use crate::control::SignalCell;
use crate::error::PipelineError;
use crate::queue::Queue;
use crate::workers::{Callbacks, ErrorReporter, RunSettings, WorkerContext, run_worker};

/// Creates one worker process for `slot`.
pub trait Spawn {
    /// Starts a worker and returns its pid. `attempt` is the slot's current failure streak.
    fn spawn(&mut self, slot: Slot, attempt: u32) -> Result<Pid, PipelineError>;
}

/// Forks the master and runs [`run_worker`] in the child.
pub struct ForkSpawner {
    name: Arc<str>,
    master_pid: Pid,
    input: Queue,
    output: Queue,
    signal: SignalCell,
    callbacks: Arc<Callbacks>,
    reporter: Arc<dyn ErrorReporter>,
    settings: RunSettings,
}

impl ForkSpawner {
    pub(crate) fn new(
        name: Arc<str>,
        input: Queue,
        output: Queue,
        signal: SignalCell,
        callbacks: Arc<Callbacks>,
        reporter: Arc<dyn ErrorReporter>,
        settings: RunSettings,
    ) -> Self {
        Self {
            name,
            master_pid: Pid::this(),
            input,
            output,
            signal,
            callbacks,
            reporter,
            settings,
        }
    }

    fn context(&self, slot: Slot, attempt: u32) -> WorkerContext {
        WorkerContext {
            role: slot.role,
            worker_id: slot.worker_id,
            attempt,
            master_pid: self.master_pid,
            name: Arc::clone(&self.name),
            input: self.input.clone(),
            output: self.output.clone(),
            signal: self.signal.clone(),
            callbacks: Arc::clone(&self.callbacks),
            reporter: Arc::clone(&self.reporter),
            settings: self.settings.clone(),
        }
    }
}

impl Spawn for ForkSpawner {
    fn spawn(&mut self, slot: Slot, attempt: u32) -> Result<Pid, PipelineError> {
        let ctx = self.context(slot, attempt);

        // SAFETY: the master is single-threaded; the child only resets signal
        // dispositions, runs the worker and exits without unwinding into the master.
        match unsafe { fork() }.map_err(PipelineError::Spawn)? {
            ForkResult::Parent { child } => Ok(child),
            ForkResult::Child => {
                reset_signal_dispositions();
                set_process_title(&worker_title(&self.name, slot));
                std::process::exit(run_on_fresh_thread(ctx));
            }
        }
    }
}

fn run_on_fresh_thread(ctx: WorkerContext) -> i32 {
    let thread_name = format!("{}#{}", ctx.role, ctx.worker_id);
    match thread::Builder::new()
        .name(thread_name)
        .spawn(move || run_worker(ctx))
    {
        // run_worker catches callback panics; anything escaping it exits as a panic.
        Ok(handle) => handle.join().unwrap_or(2),
        Err(error) => {
            tracing::error!(%error, "failed to start worker thread");
            3
        }
    }
}

/// Role and id come first: the kernel keeps only 15 bytes of the title.
fn worker_title(name: &str, slot: Slot) -> String {
    format!("{}#{} {}", slot.role, slot.worker_id, name)
}

fn reset_signal_dispositions() {
    for sig in [
        Signal::SIGCHLD,
        Signal::SIGTERM,
        Signal::SIGINT,
        Signal::SIGUSR1,
        Signal::SIGQUIT,
    ] {
        // SAFETY: installing SIG_DFL has no handler code to be unsafe about.
        if let Err(errno) = unsafe { signal(sig, SigHandler::SigDfl) } {
            tracing::warn!(signal = sig.as_str(), %errno, "failed to reset signal disposition");
        }
    }
}

/// Best-effort process title (Linux thread name, 15 bytes max).
#[cfg(target_os = "linux")]
pub(crate) fn set_process_title(title: &str) {
    let truncated: Vec<u8> = title
        .bytes()
        .filter(|b| *b != 0)
        .take(15)
        .chain(std::iter::once(0))
        .collect();
    // SAFETY: PR_SET_NAME reads a NUL-terminated string of at most 16 bytes.
    unsafe {
        libc::prctl(libc::PR_SET_NAME, truncated.as_ptr() as libc::c_ulong, 0, 0, 0);
    }
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn set_process_title(_title: &str) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workers::Role;

    #[test]
    fn title_keeps_role_and_id_within_the_kernel_limit() {
        let title = worker_title("nightly-invoice-export", Slot::new(Role::Center, 12));
        assert_eq!(&title.as_bytes()[..15], b"center#12 night");
        assert!(title.ends_with("nightly-invoice-export"));
    }

    #[test]
    fn title_for_short_name() {
        assert_eq!(worker_title("wc", Slot::new(Role::Right, 0)), "right#0 wc");
    }
}
