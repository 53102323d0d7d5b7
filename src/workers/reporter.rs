//! # Error reporting sink.
//!
//! Worker failures never travel back to the master as values. The worker hands
//! them to an [`ErrorReporter`] and then exits with a non-zero code; the master
//! only sees the wait status.

use crate::error::WorkerError;

/// Destination for failures caught at the worker boundary.
///
/// Called in the worker process, right before it exits.
pub trait ErrorReporter: Send + Sync + 'static {
    /// Records one failure. `fatal` is `true` for panics.
    fn report(&self, error: &WorkerError, fatal: bool);
}

/// Reports through `tracing`: `error!` for fatal failures, `warn!` otherwise.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, error: &WorkerError, fatal: bool) {
        if fatal {
            tracing::error!(
                role = %error.role(),
                label = error.as_label(),
                exit_code = error.exit_code(),
                "{error}"
            );
        } else {
            tracing::warn!(
                role = %error.role(),
                label = error.as_label(),
                exit_code = error.exit_code(),
                "{error}"
            );
        }
    }
}
