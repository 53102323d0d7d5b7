//! Inter-process queues connecting the pipeline stages.
//!
//! ## Contents
//! - [`Message`] opaque payload with JSON helpers
//! - [`Queue`] handle: push / push_empty / pop / is_empty, with file spillover
//! - [`Transport`] the pluggable frame carrier
//! - [`SysvTransport`] System V message queues (Linux)
//!
//! ## Topology
//! ```text
//! left ──push──► [input queue  key+1] ──pop──► center ──push──► [output queue key+2] ──pop──► right
//! ```
//! Both keys derive from the configured queue name via [`queue_key`].

mod frame;
mod handle;
#[cfg(test)]
pub(crate) mod memory;
mod message;
#[cfg(target_os = "linux")]
mod sysv;
mod transport;

#[cfg(target_os = "linux")]
use std::path::Path;
#[cfg(target_os = "linux")]
use std::sync::Arc;

pub use handle::{Queue, SpillSettings};
pub use message::Message;
#[cfg(target_os = "linux")]
pub use sysv::{SysvTransport, queue_key};
pub use transport::Transport;

#[cfg(target_os = "linux")]
use crate::error::QueueError;

/// Opens the input and output queues for `name`.
///
/// The same name always resolves to the same pair of kernel queues, so a
/// restarted master picks up what its predecessor left queued.
#[cfg(target_os = "linux")]
pub fn open_pair(
    name: &str,
    temp_dir: &Path,
    spill_threshold: usize,
) -> Result<(Queue, Queue), QueueError> {
    let key = queue_key(name);
    let spill = SpillSettings {
        dir: temp_dir.to_path_buf(),
        threshold: spill_threshold,
    };
    let input = Queue::new(Arc::new(SysvTransport::open(key + 1)?), spill.clone());
    let output = Queue::new(Arc::new(SysvTransport::open(key + 2)?), spill);
    Ok((input, output))
}
