//! Wait-status decoding and the non-blocking reap loop.

use std::fmt;

use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;

/// How a worker process ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    /// Exited with a code.
    Exited(i32),
    /// Killed by a signal.
    Signaled(Signal),
}

impl Termination {
    /// Exit code 0.
    pub fn is_success(self) -> bool {
        matches!(self, Termination::Exited(0))
    }

    pub fn exit_code(self) -> Option<i32> {
        match self {
            Termination::Exited(code) => Some(code),
            Termination::Signaled(_) => None,
        }
    }

    /// Maps a terminal wait status; `None` for stops, continues and `StillAlive`.
    pub fn from_status(status: WaitStatus) -> Option<(Pid, Self)> {
        match status {
            WaitStatus::Exited(pid, code) => Some((pid, Termination::Exited(code))),
            WaitStatus::Signaled(pid, signal, _) => Some((pid, Termination::Signaled(signal))),
            _ => None,
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Exited(code) => write!(f, "exit {code}"),
            Termination::Signaled(signal) => write!(f, "signal {}", signal.as_str()),
        }
    }
}

/// Collects every child that has already terminated, without blocking.
///
/// Stops at the first `StillAlive` or `ECHILD`; `EINTR` is retried.
pub fn reap_exited() -> Vec<(Pid, Termination)> {
    let mut reaped = Vec::new();
    loop {
        match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => break,
            Ok(status) => {
                if let Some(done) = Termination::from_status(status) {
                    reaped.push(done);
                }
            }
            Err(Errno::EINTR) => continue,
            Err(Errno::ECHILD) => break,
            Err(errno) => {
                tracing::warn!(%errno, "waitpid failed");
                break;
            }
        }
    }
    reaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_terminal_statuses_map() {
        let pid = Pid::from_raw(99);
        assert_eq!(
            Termination::from_status(WaitStatus::Exited(pid, 3)),
            Some((pid, Termination::Exited(3)))
        );
        assert_eq!(
            Termination::from_status(WaitStatus::Signaled(pid, Signal::SIGKILL, false)),
            Some((pid, Termination::Signaled(Signal::SIGKILL)))
        );
        assert_eq!(Termination::from_status(WaitStatus::StillAlive), None);
        assert_eq!(
            Termination::from_status(WaitStatus::Stopped(pid, Signal::SIGSTOP)),
            None
        );
    }

    #[test]
    fn success_is_exit_zero_only() {
        assert!(Termination::Exited(0).is_success());
        assert!(!Termination::Exited(1).is_success());
        assert!(!Termination::Signaled(Signal::SIGTERM).is_success());
        assert_eq!(Termination::Signaled(Signal::SIGKILL).to_string(), "signal SIGKILL");
    }
}
