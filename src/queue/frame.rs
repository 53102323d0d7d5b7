//! Wire frames stored in a queue entry: one tag byte followed by the body.
//!
//! ```text
//! 0x00                 empty sentinel (unblocks a parked consumer)
//! 0x01 <payload>       inline payload
//! 0x02 <path bytes>    payload spilled to a file; the consumer deletes it
//! ```

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

use crate::error::QueueError;

const TAG_EMPTY: u8 = 0;
const TAG_INLINE: u8 = 1;
const TAG_SPILLED: u8 = 2;

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Frame {
    Empty,
    Inline(Vec<u8>),
    Spilled(PathBuf),
}

impl Frame {
    pub(crate) fn encode(&self) -> Vec<u8> {
        match self {
            Frame::Empty => vec![TAG_EMPTY],
            Frame::Inline(payload) => tagged(TAG_INLINE, payload),
            Frame::Spilled(path) => tagged(TAG_SPILLED, path.as_os_str().as_bytes()),
        }
    }

    pub(crate) fn decode(raw: &[u8]) -> Result<Self, QueueError> {
        let Some((&tag, body)) = raw.split_first() else {
            return Err(QueueError::Frame("zero-length frame".into()));
        };
        match tag {
            TAG_EMPTY => Ok(Frame::Empty),
            TAG_INLINE => Ok(Frame::Inline(body.to_vec())),
            TAG_SPILLED if !body.is_empty() => {
                Ok(Frame::Spilled(PathBuf::from(OsStr::from_bytes(body))))
            }
            TAG_SPILLED => Err(QueueError::Frame("spilled frame without a path".into())),
            other => Err(QueueError::Frame(format!("unknown tag {other:#04x}"))),
        }
    }
}

fn tagged(tag: u8, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 1);
    out.push(tag);
    out.extend_from_slice(body);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_is_a_single_byte() {
        assert_eq!(Frame::Empty.encode(), vec![0]);
        assert_eq!(Frame::decode(&[0]).unwrap(), Frame::Empty);
    }

    #[test]
    fn empty_inline_payload_is_not_the_sentinel() {
        let raw = Frame::Inline(Vec::new()).encode();
        assert_eq!(Frame::decode(&raw).unwrap(), Frame::Inline(Vec::new()));
    }

    #[test]
    fn spilled_frame_keeps_path() {
        let path = PathBuf::from("/tmp/pipevisor-abc.msg");
        let raw = Frame::Spilled(path.clone()).encode();
        assert_eq!(Frame::decode(&raw).unwrap(), Frame::Spilled(path));
    }

    #[test]
    fn malformed_frames_are_rejected() {
        assert!(Frame::decode(&[]).is_err());
        assert!(Frame::decode(&[2]).is_err());
        assert!(Frame::decode(&[9, 1, 2]).is_err());
    }
}
