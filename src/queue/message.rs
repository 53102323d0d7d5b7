//! # Queue payloads.
//!
//! A [`Message`] is an opaque byte payload. The pipeline never looks inside it;
//! the JSON helpers exist for callbacks that exchange structured records.
//!
//! ## Example
//! ```rust
//! use pipevisor::Message;
//!
//! let msg = Message::json(&vec![1, 2, 3]).unwrap();
//! let back: Vec<u32> = msg.decode_json().unwrap();
//! assert_eq!(back, vec![1, 2, 3]);
//! ```

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::QueueError;

/// Opaque payload carried by a queue.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Message {
    payload: Vec<u8>,
}

impl Message {
    /// Wraps raw bytes.
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Serializes `value` as JSON.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, QueueError> {
        Ok(Self::new(serde_json::to_vec(value)?))
    }

    /// Deserializes the payload as JSON.
    pub fn decode_json<T: DeserializeOwned>(&self) -> Result<T, QueueError> {
        Ok(serde_json::from_slice(&self.payload)?)
    }

    /// Payload bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.payload
    }

    /// Payload as UTF-8, if it is valid.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    /// Consumes the message and returns the payload.
    #[inline]
    pub fn into_bytes(self) -> Vec<u8> {
        self.payload
    }

    /// Payload length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is zero-length. A zero-length message is still a message,
    /// not the queue's empty sentinel.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

impl From<Vec<u8>> for Message {
    fn from(payload: Vec<u8>) -> Self {
        Self::new(payload)
    }
}

impl From<&[u8]> for Message {
    fn from(payload: &[u8]) -> Self {
        Self::new(payload)
    }
}

impl From<String> for Message {
    fn from(payload: String) -> Self {
        Self::new(payload.into_bytes())
    }
}

impl From<&str> for Message {
    fn from(payload: &str) -> Self {
        Self::new(payload.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Serialize, serde::Deserialize, Debug, PartialEq)]
    struct Job {
        id: u64,
        url: String,
    }

    #[test]
    fn json_helpers_preserve_structure() {
        let job = Job {
            id: 7,
            url: "https://example.org".into(),
        };
        let msg = Message::json(&job).unwrap();
        assert_eq!(msg.decode_json::<Job>().unwrap(), job);
    }

    #[test]
    fn decode_json_reports_garbage() {
        let msg = Message::from("not json");
        let err = msg.decode_json::<Job>().unwrap_err();
        assert_eq!(err.as_label(), "queue_json");
    }

    #[test]
    fn text_accessors() {
        let msg = Message::from("hello");
        assert_eq!(msg.as_str(), Some("hello"));
        assert_eq!(msg.len(), 5);
        assert!(Message::default().is_empty());
        assert_eq!(Message::new(vec![0xff, 0xfe]).as_str(), None);
    }
}
