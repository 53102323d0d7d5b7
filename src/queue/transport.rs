//! # Queue transport seam.
//!
//! A [`Transport`] moves already-encoded frames between processes. The pipeline
//! only needs four things from it: a non-blocking send, a blocking receive, a
//! best-effort depth, and (for tests and tooling) explicit removal.
//!
//! Implementations must stay usable across `fork`: the master creates them and
//! every worker inherits the same handle.

use crate::error::QueueError;

/// Frame carrier shared by the master and its workers.
pub trait Transport: Send + Sync + 'static {
    /// Enqueues one frame without blocking.
    ///
    /// Returns [`QueueError::Full`] when the queue cannot take it right now.
    fn send(&self, frame: &[u8]) -> Result<(), QueueError>;

    /// Enqueues one frame, waiting for room if the queue is full.
    fn send_wait(&self, frame: &[u8]) -> Result<(), QueueError>;

    /// Dequeues one frame, blocking until one is available.
    fn recv(&self) -> Result<Vec<u8>, QueueError>;

    /// Number of frames currently queued. Best effort: another process may
    /// change it immediately after the call.
    fn pending(&self) -> Result<usize, QueueError>;

    /// Largest frame the transport accepts.
    fn max_frame(&self) -> usize {
        usize::MAX
    }

    /// Removes the underlying queue object.
    fn destroy(&self) -> Result<(), QueueError> {
        Ok(())
    }
}
