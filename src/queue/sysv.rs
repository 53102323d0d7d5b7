//! # System V message queue transport.
//!
//! Queues are kernel objects addressed by a numeric key, so a master that
//! restarts with the same queue name reattaches to whatever its predecessor
//! left behind. Nothing here removes a queue implicitly.
//!
//! ## Limits
//! The kernel caps a single message at `msgmax` bytes (8192 by default) and a
//! whole queue at `msgmnb` bytes. `msgmax` is read once per open and reported
//! through [`Transport::max_frame`], so [`Queue`](super::Queue) spills anything
//! that would not fit. `msgmnb` is what makes a non-blocking push fail with
//! [`QueueError::Full`].

use std::mem::size_of;

use nix::errno::Errno;
use sha2::{Digest, Sha256};

use super::transport::Transport;
use crate::error::QueueError;

/// Upper bound for a single frame (the kernel's hard `MSGMAX` ceiling).
const MAX_TEXT: usize = 64 * 1024;

/// `msgmax` when `/proc/sys/kernel/msgmax` cannot be read.
const DEFAULT_MSGMAX: usize = 8192;

const MSGMAX_PATH: &str = "/proc/sys/kernel/msgmax";

/// All frames use the same message type; receivers take the first one queued.
const MESSAGE_TYPE: libc::c_long = 1;

/// Derives the base key for a queue name.
///
/// The first four bytes of `sha256(name)`, masked so that `key + 2` stays a
/// positive `key_t`.
pub fn queue_key(name: &str) -> libc::key_t {
    let digest = Sha256::digest(name.as_bytes());
    let raw = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    (raw & 0x3fff_ffff) as libc::key_t
}

/// Handle to one System V message queue.
#[derive(Debug)]
pub struct SysvTransport {
    id: libc::c_int,
    key: libc::key_t,
    max_frame: usize,
}

impl SysvTransport {
    /// Opens (creating if needed) the queue for `key`.
    pub fn open(key: libc::key_t) -> Result<Self, QueueError> {
        // SAFETY: msgget takes plain integers.
        let id = unsafe { libc::msgget(key, libc::IPC_CREAT | 0o666) };
        if id < 0 {
            return Err(QueueError::Sys {
                op: "msgget",
                errno: Errno::last(),
            });
        }
        Ok(Self {
            id,
            key,
            max_frame: kernel_msgmax().min(MAX_TEXT),
        })
    }

    /// Kernel key this queue was opened with.
    pub fn key(&self) -> libc::key_t {
        self.key
    }

    /// Deletes the kernel object. Blocked receivers in other processes fail with `EIDRM`.
    pub fn remove(&self) -> Result<(), QueueError> {
        // SAFETY: IPC_RMID ignores the buffer argument.
        let rc = unsafe { libc::msgctl(self.id, libc::IPC_RMID, std::ptr::null_mut()) };
        if rc < 0 {
            return Err(QueueError::Sys {
                op: "msgctl(IPC_RMID)",
                errno: Errno::last(),
            });
        }
        Ok(())
    }

    fn send_with(&self, frame: &[u8], flags: libc::c_int) -> Result<(), QueueError> {
        if frame.len() > self.max_frame {
            return Err(QueueError::TooLarge {
                len: frame.len(),
                max: self.max_frame,
            });
        }
        let header = size_of::<libc::c_long>();
        let mut buf = vec![0u8; header + frame.len()];
        buf[..header].copy_from_slice(&MESSAGE_TYPE.to_ne_bytes());
        buf[header..].copy_from_slice(frame);

        loop {
            // SAFETY: `buf` holds an mtype header followed by `frame.len()` bytes of text.
            let rc = unsafe { libc::msgsnd(self.id, buf.as_ptr().cast(), frame.len(), flags) };
            if rc == 0 {
                return Ok(());
            }
            match Errno::last() {
                Errno::EINTR => continue,
                Errno::EAGAIN => return Err(QueueError::Full),
                errno => return Err(QueueError::Sys { op: "msgsnd", errno }),
            }
        }
    }
}

impl Transport for SysvTransport {
    fn send(&self, frame: &[u8]) -> Result<(), QueueError> {
        self.send_with(frame, libc::IPC_NOWAIT)
    }

    fn send_wait(&self, frame: &[u8]) -> Result<(), QueueError> {
        self.send_with(frame, 0)
    }

    fn recv(&self) -> Result<Vec<u8>, QueueError> {
        let header = size_of::<libc::c_long>();
        let mut buf = vec![0u8; header + MAX_TEXT];
        loop {
            // SAFETY: `buf` has room for the header plus MAX_TEXT bytes of text.
            let n = unsafe { libc::msgrcv(self.id, buf.as_mut_ptr().cast(), MAX_TEXT, 0, 0) };
            if n >= 0 {
                let n = n as usize;
                buf.truncate(header + n);
                return Ok(buf.split_off(header));
            }
            match Errno::last() {
                Errno::EINTR => continue,
                errno => return Err(QueueError::Sys { op: "msgrcv", errno }),
            }
        }
    }

    fn pending(&self) -> Result<usize, QueueError> {
        // SAFETY: msqid_ds is plain old data; IPC_STAT fills it in.
        let mut ds: libc::msqid_ds = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::msgctl(self.id, libc::IPC_STAT, &mut ds) };
        if rc < 0 {
            return Err(QueueError::Sys {
                op: "msgctl(IPC_STAT)",
                errno: Errno::last(),
            });
        }
        Ok(ds.msg_qnum as usize)
    }

    fn max_frame(&self) -> usize {
        self.max_frame
    }

    fn destroy(&self) -> Result<(), QueueError> {
        self.remove()
    }
}

/// Per-message limit configured in the running kernel.
fn kernel_msgmax() -> usize {
    std::fs::read_to_string(MSGMAX_PATH)
        .ok()
        .and_then(|raw| parse_msgmax(&raw))
        .unwrap_or(DEFAULT_MSGMAX)
}

fn parse_msgmax(raw: &str) -> Option<usize> {
    raw.trim().parse().ok().filter(|n| *n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_stable_and_positive() {
        let a = queue_key("crawler");
        assert_eq!(a, queue_key("crawler"));
        assert!(a >= 0);
        assert!(a.checked_add(2).is_some());
        assert_ne!(a, queue_key("indexer"));
    }

    #[test]
    fn empty_name_still_hashes() {
        assert!(queue_key("") >= 0);
    }

    #[test]
    fn send_recv_pending_remove() {
        let name = format!("pipevisor-unit-{}", std::process::id());
        let q = SysvTransport::open(queue_key(&name) + 1).unwrap();

        q.send(b"\x01first").unwrap();
        q.send(b"\x01second").unwrap();
        assert_eq!(q.pending().unwrap(), 2);
        assert_eq!(q.recv().unwrap(), b"\x01first");
        assert_eq!(q.recv().unwrap(), b"\x01second");
        assert_eq!(q.pending().unwrap(), 0);

        q.remove().unwrap();
    }

    #[test]
    fn oversized_frame_is_rejected_before_the_syscall() {
        let name = format!("pipevisor-unit-big-{}", std::process::id());
        let q = SysvTransport::open(queue_key(&name) + 1).unwrap();
        let err = q.send(&vec![0u8; MAX_TEXT + 1]).unwrap_err();
        assert_eq!(err.as_label(), "queue_too_large");
        q.remove().unwrap();
    }

    #[test]
    fn frame_limit_follows_the_kernel() {
        let name = format!("pipevisor-unit-msgmax-{}", std::process::id());
        let q = SysvTransport::open(queue_key(&name) + 1).unwrap();
        assert_eq!(q.max_frame(), kernel_msgmax().min(MAX_TEXT));

        let err = q.send(&vec![0u8; q.max_frame() + 1]).unwrap_err();
        assert!(matches!(err, QueueError::TooLarge { max, .. } if max == q.max_frame()));
        q.send(&vec![1u8; q.max_frame()]).unwrap();
        assert_eq!(q.recv().unwrap().len(), q.max_frame());
        q.remove().unwrap();
    }

    #[test]
    fn msgmax_parsing() {
        assert_eq!(parse_msgmax("8192\n"), Some(8192));
        assert_eq!(parse_msgmax("0\n"), None);
        assert_eq!(parse_msgmax("garbage"), None);
    }
}
