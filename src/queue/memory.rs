//! In-process transport used by unit tests. Not shared across `fork`.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};

use super::transport::Transport;
use crate::error::QueueError;

#[derive(Default)]
pub(crate) struct MemoryTransport {
    frames: Mutex<VecDeque<Vec<u8>>>,
    ready: Condvar,
    capacity: Option<usize>,
    max_frame: Option<usize>,
}

impl MemoryTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn bounded(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    pub(crate) fn with_max_frame(max_frame: usize) -> Self {
        Self {
            max_frame: Some(max_frame),
            ..Self::default()
        }
    }

    fn check_size(&self, frame: &[u8]) -> Result<(), QueueError> {
        match self.max_frame {
            Some(max) if frame.len() > max => Err(QueueError::TooLarge {
                len: frame.len(),
                max,
            }),
            _ => Ok(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Vec<u8>>> {
        self.frames.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of the queued frames, oldest first.
    pub(crate) fn frames(&self) -> Vec<Vec<u8>> {
        self.lock().iter().cloned().collect()
    }
}

impl Transport for MemoryTransport {
    fn send(&self, frame: &[u8]) -> Result<(), QueueError> {
        self.check_size(frame)?;
        let mut frames = self.lock();
        if self.capacity.is_some_and(|cap| frames.len() >= cap) {
            return Err(QueueError::Full);
        }
        frames.push_back(frame.to_vec());
        self.ready.notify_one();
        Ok(())
    }

    fn send_wait(&self, frame: &[u8]) -> Result<(), QueueError> {
        self.check_size(frame)?;
        let mut frames = self.lock();
        frames.push_back(frame.to_vec());
        self.ready.notify_one();
        Ok(())
    }

    fn recv(&self) -> Result<Vec<u8>, QueueError> {
        let mut frames = self.lock();
        loop {
            if let Some(frame) = frames.pop_front() {
                return Ok(frame);
            }
            frames = self
                .ready
                .wait(frames)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    fn pending(&self) -> Result<usize, QueueError> {
        Ok(self.lock().len())
    }

    fn max_frame(&self) -> usize {
        self.max_frame.unwrap_or(usize::MAX)
    }
}
