//! # Process pool table.
//!
//! Maps every live worker pid to its [`PoolEntry`]. Owned and mutated only by
//! the master's single thread.
//!
//! ## Rules
//! - Every live worker has exactly one entry; no two entries share a pid.
//! - Entries are inserted at spawn and removed when the master reaps the pid.
//! - Failure streaks are kept per [`Slot`], not per pid, so they survive respawns.

use std::collections::HashMap;
use std::time::Instant;

use nix::unistd::Pid;

use crate::error::PipelineError;
use crate::workers::Role;

/// Stable identity of a worker position: the role and its index within it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot {
    /// Stage.
    pub role: Role,
    /// Index within the role.
    pub worker_id: usize,
}

impl Slot {
    pub fn new(role: Role, worker_id: usize) -> Self {
        Self { role, worker_id }
    }
}

/// One live worker process.
#[derive(Clone, Debug)]
pub struct PoolEntry {
    /// OS process id.
    pub pid: Pid,
    /// Position in the pipeline.
    pub slot: Slot,
    /// When the master forked it.
    pub spawned_at: Instant,
}

impl PoolEntry {
    #[inline]
    pub fn role(&self) -> Role {
        self.slot.role
    }

    #[inline]
    pub fn worker_id(&self) -> usize {
        self.slot.worker_id
    }
}

/// Live workers keyed by pid.
#[derive(Debug, Default)]
pub struct ProcessPool {
    entries: HashMap<Pid, PoolEntry>,
    streaks: HashMap<Slot, u32>,
}

impl ProcessPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a freshly spawned worker.
    pub fn insert(&mut self, pid: Pid, slot: Slot) -> Result<(), PipelineError> {
        if self.entries.contains_key(&pid) {
            return Err(PipelineError::DuplicatePid { pid });
        }
        self.entries.insert(
            pid,
            PoolEntry {
                pid,
                slot,
                spawned_at: Instant::now(),
            },
        );
        Ok(())
    }

    /// Removes and returns the entry for `pid`.
    pub fn remove(&mut self, pid: Pid) -> Option<PoolEntry> {
        self.entries.remove(&pid)
    }

    pub fn get(&self, pid: Pid) -> Option<&PoolEntry> {
        self.entries.get(&pid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Live workers of `role`.
    pub fn count(&self, role: Role) -> usize {
        self.entries.values().filter(|e| e.role() == role).count()
    }

    pub fn contains_role(&self, role: Role) -> bool {
        self.entries.values().any(|e| e.role() == role)
    }

    /// Live pids, sorted.
    pub fn pids(&self) -> Vec<Pid> {
        let mut pids: Vec<_> = self.entries.keys().copied().collect();
        pids.sort_by_key(|pid| pid.as_raw());
        pids
    }

    pub fn entries(&self) -> impl Iterator<Item = &PoolEntry> {
        self.entries.values()
    }

    /// Consecutive failed exits of `slot`.
    pub fn streak(&self, slot: Slot) -> u32 {
        self.streaks.get(&slot).copied().unwrap_or(0)
    }

    /// Updates the failure streak of `slot` after one of its workers exited.
    pub fn record_exit(&mut self, slot: Slot, success: bool) {
        if success {
            self.streaks.remove(&slot);
        } else {
            *self.streaks.entry(slot).or_insert(0) += 1;
        }
    }
}
