//! # Shared control-signal cell.
//!
//! A single [`AtomicU8`] living in an anonymous `MAP_SHARED` mapping. The master
//! maps it before forking any worker, so every child inherits the same physical
//! page and observes the master's writes without a round trip through IPC.
//!
//! ## Rules
//! - **Single writer**: only the master calls [`SignalCell::escalate`].
//! - **Snapshot reads**: [`SignalCell::get`] is a poll, never a synchronization point.
//! - **Monotonic**: writes that are not a legal escalation are refused.

use std::num::NonZeroUsize;
use std::ptr::NonNull;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use nix::sys::mman::{MapFlags, ProtFlags, mmap_anonymous, munmap};

use super::signal::ControlSignal;
use crate::error::PipelineError;

/// Owner of the mapping; unmapped when the last handle in this process drops.
struct Mapping {
    ptr: NonNull<AtomicU8>,
    len: usize,
}

// SAFETY: the mapping is only accessed through `AtomicU8`.
unsafe impl Send for Mapping {}
unsafe impl Sync for Mapping {}

impl Drop for Mapping {
    fn drop(&mut self) {
        // SAFETY: `ptr`/`len` come from a successful `mmap_anonymous` and are unmapped once.
        let _ = unsafe { munmap(self.ptr.cast(), self.len) };
    }
}

/// Handle to the shared control signal.
///
/// Cheap to clone; all clones (and all forked children) see the same value.
#[derive(Clone)]
pub struct SignalCell {
    map: Arc<Mapping>,
}

impl SignalCell {
    /// Maps a fresh cell holding [`ControlSignal::None`].
    pub fn new() -> Result<Self, PipelineError> {
        let len = page_len();
        // SAFETY: a fresh anonymous mapping does not alias any Rust object.
        let ptr = unsafe {
            mmap_anonymous(
                None,
                NonZeroUsize::new(len).unwrap_or(NonZeroUsize::MIN),
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
            )
        }
        .map_err(PipelineError::SharedMemory)?;

        let cell = Self {
            map: Arc::new(Mapping {
                ptr: ptr.cast(),
                len,
            }),
        };
        cell.atomic().store(ControlSignal::None.as_raw(), Ordering::Release);
        Ok(cell)
    }

    #[inline]
    fn atomic(&self) -> &AtomicU8 {
        // SAFETY: the mapping is page-aligned, zero-initialized and lives as long as `self.map`.
        unsafe { self.map.ptr.as_ref() }
    }

    /// Current signal (snapshot).
    #[inline]
    pub fn get(&self) -> ControlSignal {
        ControlSignal::from_raw(self.atomic().load(Ordering::Acquire))
    }

    /// Moves the signal to `next` if that is a legal escalation.
    ///
    /// Returns `true` when the stored value changed.
    pub fn escalate(&self, next: ControlSignal) -> bool {
        let current = self.get();
        if !current.can_escalate_to(next) {
            return false;
        }
        self.atomic().store(next.as_raw(), Ordering::Release);
        true
    }
}

impl std::fmt::Debug for SignalCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalCell").field("signal", &self.get()).finish()
    }
}

fn page_len() -> usize {
    // SAFETY: sysconf has no preconditions.
    let raw = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    usize::try_from(raw).ok().filter(|n| *n > 0).unwrap_or(4096)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_none() {
        let cell = SignalCell::new().unwrap();
        assert_eq!(cell.get(), ControlSignal::None);
    }

    #[test]
    fn escalation_is_monotonic() {
        let cell = SignalCell::new().unwrap();
        assert!(cell.escalate(ControlSignal::StopLeft));
        assert!(!cell.escalate(ControlSignal::Restart));
        assert!(!cell.escalate(ControlSignal::None));
        assert_eq!(cell.get(), ControlSignal::StopLeft);

        assert!(cell.escalate(ControlSignal::StopAll));
        assert!(!cell.escalate(ControlSignal::StopLeft));
        assert_eq!(cell.get(), ControlSignal::StopAll);
    }

    #[test]
    fn clones_share_the_value() {
        let cell = SignalCell::new().unwrap();
        let other = cell.clone();
        assert!(cell.escalate(ControlSignal::Restart));
        assert_eq!(other.get(), ControlSignal::Restart);
    }

    #[test]
    fn forked_child_observes_master_write() {
        use nix::sys::wait::{WaitStatus, waitpid};
        use nix::unistd::{ForkResult, fork};
        use std::time::{Duration, Instant};

        let cell = SignalCell::new().unwrap();

        // SAFETY: the child only polls the atomic and exits.
        match unsafe { fork() }.unwrap() {
            ForkResult::Child => {
                let deadline = Instant::now() + Duration::from_secs(5);
                while Instant::now() < deadline {
                    if cell.get() == ControlSignal::StopLeft {
                        std::process::exit(0);
                    }
                    std::thread::sleep(Duration::from_millis(5));
                }
                std::process::exit(1);
            }
            ForkResult::Parent { child } => {
                std::thread::sleep(Duration::from_millis(20));
                assert!(cell.escalate(ControlSignal::StopLeft));
                let status = waitpid(child, None).unwrap();
                assert_eq!(status, WaitStatus::Exited(child, 0));
            }
        }
    }
}
