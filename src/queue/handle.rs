//! # Queue handle used by the master and the workers.
//!
//! [`Queue`] layers three things over a [`Transport`]:
//! - frame encoding with a distinguishable empty sentinel;
//! - spillover of large payloads to files in a temp directory;
//! - a best-effort emptiness check for the stop escalation.
//!
//! ```text
//! push(msg) ── fits inline ─────────► Inline(bytes) ─┐
//!           └─ len > threshold    ──► write file ────┴─► Spilled(path) ──► transport
//!              or frame > max_frame
//!
//! pop() ◄── Empty        ► None
//!       ◄── Inline(bytes) ► Some(msg)
//!       ◄── Spilled(path) ► read file, delete it, Some(msg)
//! ```

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::frame::Frame;
use super::message::Message;
use super::transport::Transport;
use crate::error::QueueError;

/// Where and when payloads spill to disk.
#[derive(Clone, Debug)]
pub struct SpillSettings {
    /// Directory holding spill files. Must be visible to every worker.
    pub dir: PathBuf,
    /// Payloads strictly larger than this many bytes are spilled. Payloads
    /// whose inline frame exceeds the transport's frame limit spill regardless.
    pub threshold: usize,
}

/// Cloneable handle to one inter-process queue.
#[derive(Clone)]
pub struct Queue {
    transport: Arc<dyn Transport>,
    spill: SpillSettings,
}

impl Queue {
    /// Wraps a transport.
    pub fn new(transport: Arc<dyn Transport>, spill: SpillSettings) -> Self {
        Self { transport, spill }
    }

    /// Enqueues `msg` without blocking.
    ///
    /// Returns [`QueueError::Full`] if the transport has no room; a spill file
    /// written for this push is removed again in that case.
    pub fn push(&self, msg: &Message) -> Result<(), QueueError> {
        self.push_frame(msg, false)
    }

    /// Enqueues `msg`, waiting for room if the queue is full.
    pub fn push_wait(&self, msg: &Message) -> Result<(), QueueError> {
        self.push_frame(msg, true)
    }

    /// Enqueues the empty sentinel.
    pub fn push_empty(&self) -> Result<(), QueueError> {
        self.transport.send(&Frame::Empty.encode())
    }

    /// Dequeues one entry, blocking until one is available.
    ///
    /// `None` means the empty sentinel was received.
    pub fn pop(&self) -> Result<Option<Message>, QueueError> {
        let raw = self.transport.recv()?;
        match Frame::decode(&raw)? {
            Frame::Empty => Ok(None),
            Frame::Inline(payload) => Ok(Some(Message::new(payload))),
            Frame::Spilled(path) => {
                let payload = fs::read(&path)?;
                if let Err(error) = fs::remove_file(&path) {
                    tracing::warn!(path = %path.display(), %error, "failed to remove spill file");
                }
                Ok(Some(Message::new(payload)))
            }
        }
    }

    /// Whether the queue currently holds nothing. Best effort.
    pub fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.transport.pending()? == 0)
    }

    /// Number of queued entries. Best effort.
    pub fn len(&self) -> Result<usize, QueueError> {
        self.transport.pending()
    }

    /// Removes the underlying queue object.
    pub fn destroy(&self) -> Result<(), QueueError> {
        self.transport.destroy()
    }

    /// Spill settings in effect.
    pub fn spill(&self) -> &SpillSettings {
        &self.spill
    }

    fn push_frame(&self, msg: &Message, wait: bool) -> Result<(), QueueError> {
        let spilled = msg.len() > self.spill.threshold
            || msg.len().saturating_add(1) > self.transport.max_frame();
        let frame = if spilled {
            Frame::Spilled(write_spill_file(&self.spill.dir, msg.as_bytes())?)
        } else {
            Frame::Inline(msg.as_bytes().to_vec())
        };

        let raw = frame.encode();
        let sent = if wait {
            self.transport.send_wait(&raw)
        } else {
            self.transport.send(&raw)
        };

        if sent.is_err() {
            if let Frame::Spilled(path) = &frame {
                let _ = fs::remove_file(path);
            }
        }
        sent
    }
}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue").field("spill", &self.spill).finish_non_exhaustive()
    }
}

/// Writes `payload` to a fresh, persistent file in `dir` and returns its path.
fn write_spill_file(dir: &Path, payload: &[u8]) -> Result<PathBuf, QueueError> {
    let mut file = tempfile::Builder::new()
        .prefix("pipevisor-")
        .suffix(".msg")
        .tempfile_in(dir)?;
    file.write_all(payload)?;
    file.flush()?;
    let (_, path) = file.keep().map_err(|e| e.error)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::memory::MemoryTransport;

    fn queue_in(dir: &Path, threshold: usize) -> (Queue, Arc<MemoryTransport>) {
        let transport = Arc::new(MemoryTransport::new());
        let queue = Queue::new(
            transport.clone(),
            SpillSettings {
                dir: dir.to_path_buf(),
                threshold,
            },
        );
        (queue, transport)
    }

    #[test]
    fn sentinel_pops_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let (q, _) = queue_in(dir.path(), 64);
        q.push_empty().unwrap();
        assert_eq!(q.pop().unwrap(), None);
    }

    #[test]
    fn zero_length_message_is_not_the_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let (q, _) = queue_in(dir.path(), 64);
        q.push(&Message::default()).unwrap();
        assert_eq!(q.pop().unwrap(), Some(Message::default()));
    }

    #[test]
    fn fifo_order_is_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let (q, _) = queue_in(dir.path(), 64);
        for word in ["a", "b", "c"] {
            q.push(&Message::from(word)).unwrap();
        }
        let popped: Vec<_> = (0..3)
            .map(|_| q.pop().unwrap().unwrap().into_bytes())
            .collect();
        assert_eq!(popped, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn large_payload_spills_and_file_is_removed_on_pop() {
        let dir = tempfile::tempdir().unwrap();
        let (q, transport) = queue_in(dir.path(), 16);
        let big = Message::new(vec![7u8; 1024]);

        q.push(&big).unwrap();
        let frames = transport.frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0][0], 2, "frame should carry a spill path");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);

        assert_eq!(q.pop().unwrap(), Some(big));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn payload_at_threshold_stays_inline() {
        let dir = tempfile::tempdir().unwrap();
        let (q, transport) = queue_in(dir.path(), 16);
        q.push(&Message::new(vec![1u8; 16])).unwrap();
        assert_eq!(transport.frames()[0][0], 1);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn payload_over_the_frame_limit_spills_below_the_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(MemoryTransport::with_max_frame(128));
        let q = Queue::new(
            transport.clone(),
            SpillSettings {
                dir: dir.path().to_path_buf(),
                threshold: 4096,
            },
        );

        q.push(&Message::new(vec![3u8; 127])).unwrap();
        let big = Message::new(vec![4u8; 128]);
        q.push(&big).unwrap();

        let tags: Vec<u8> = transport.frames().iter().map(|f| f[0]).collect();
        assert_eq!(tags, vec![1, 2]);
        assert_eq!(q.pop().unwrap(), Some(Message::new(vec![3u8; 127])));
        assert_eq!(q.pop().unwrap(), Some(big));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn full_queue_cleans_up_spill_file() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(MemoryTransport::bounded(0));
        let q = Queue::new(
            transport,
            SpillSettings {
                dir: dir.path().to_path_buf(),
                threshold: 4,
            },
        );
        let err = q.push(&Message::new(vec![0u8; 32])).unwrap_err();
        assert_eq!(err.as_label(), "queue_full");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn emptiness_tracks_pending_frames() {
        let dir = tempfile::tempdir().unwrap();
        let (q, _) = queue_in(dir.path(), 64);
        assert!(q.is_empty().unwrap());
        q.push(&Message::from("x")).unwrap();
        assert!(!q.is_empty().unwrap());
        assert_eq!(q.len().unwrap(), 1);
        q.pop().unwrap();
        assert!(q.is_empty().unwrap());
    }
}
