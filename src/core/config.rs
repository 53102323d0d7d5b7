//! # Pipeline configuration.
//!
//! Provides [`PipelineConfig`], the settings a [`Supervisor`](crate::Supervisor)
//! is built from, and the [`Mode`] bitmask.
//!
//! Config can be built in code (public fields + `Default`) or loaded from TOML:
//!
//! ```toml
//! name = "crawler"
//! mode = ["daemon", "assembly_line"]   # or: mode = 5
//! left_process = 1
//! center_process = 8
//! right_process = 2
//! max_executions = 16000
//! queue_name = "crawler-prod"
//! temp_dir = "/var/tmp/crawler"
//! ```
//!
//! ## Forced counts
//! [`PipelineConfig::normalized`] applies the mode rules once, at build time:
//! - daemon bit unset → `left_process = 1`
//! - push bit set → `right_process = 0`
//! - `max_executions` is at least 1

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::PipelineError;
use crate::policies::BackoffPolicy;
use crate::workers::Role;

/// Pipeline mode bitmask.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "ModeRepr")]
pub struct Mode(u8);

impl Mode {
    /// Named flag with no behavior of its own; part of the default mode.
    pub const ASSEMBLY_LINE: Mode = Mode(1);
    /// Center workers deliver to an external sink; no right workers run.
    pub const PUSH: Mode = Mode(2);
    /// Long-running pool with restart support.
    pub const DAEMON: Mode = Mode(4);

    const ALL_BITS: u8 = 0b111;

    /// Mode with no flags set.
    pub const fn empty() -> Self {
        Mode(0)
    }

    /// Builds a mode from raw bits, dropping unknown ones.
    pub const fn from_bits_truncate(bits: u8) -> Self {
        Mode(bits & Self::ALL_BITS)
    }

    /// Raw bits.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether every flag in `other` is set.
    pub const fn contains(self, other: Mode) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_daemon(self) -> bool {
        self.contains(Mode::DAEMON)
    }

    pub const fn is_push(self) -> bool {
        self.contains(Mode::PUSH)
    }

    fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "assembly_line" => Some(Mode::ASSEMBLY_LINE),
            "push" => Some(Mode::PUSH),
            "daemon" => Some(Mode::DAEMON),
            _ => None,
        }
    }
}

impl Default for Mode {
    /// `DAEMON | ASSEMBLY_LINE`
    fn default() -> Self {
        Mode::DAEMON | Mode::ASSEMBLY_LINE
    }
}

impl BitOr for Mode {
    type Output = Mode;

    fn bitor(self, rhs: Mode) -> Mode {
        Mode(self.0 | rhs.0)
    }
}

impl BitOrAssign for Mode {
    fn bitor_assign(&mut self, rhs: Mode) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        for (flag, name) in [
            (Mode::DAEMON, "DAEMON"),
            (Mode::PUSH, "PUSH"),
            (Mode::ASSEMBLY_LINE, "ASSEMBLY_LINE"),
        ] {
            if self.contains(flag) {
                names.push(name);
            }
        }
        if names.is_empty() {
            f.write_str("Mode(empty)")
        } else {
            write!(f, "Mode({})", names.join(" | "))
        }
    }
}

/// Accepted TOML shapes for `mode`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ModeRepr {
    Bits(u8),
    Names(Vec<String>),
}

impl TryFrom<ModeRepr> for Mode {
    type Error = String;

    fn try_from(repr: ModeRepr) -> Result<Self, Self::Error> {
        match repr {
            ModeRepr::Bits(bits) if bits & !Mode::ALL_BITS == 0 => Ok(Mode(bits)),
            ModeRepr::Bits(bits) => Err(format!("mode bits {bits:#x} out of range")),
            ModeRepr::Names(names) => names.iter().try_fold(Mode::empty(), |acc, name| {
                Mode::from_name(name)
                    .map(|flag| acc | flag)
                    .ok_or_else(|| format!("unknown mode flag {name:?}"))
            }),
        }
    }
}

/// Configuration of one pipeline instance.
///
/// All fields are public. Use the helper accessors instead of re-deriving
/// mode rules or sentinel values across the codebase.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Used in process titles (`"<name> master"`, `"<name> center #3"`).
    pub name: String,
    /// Mode bitmask.
    pub mode: Mode,
    /// Producer processes (forced to 1 without the daemon bit).
    pub left_process: usize,
    /// Input-queue consumers.
    pub center_process: usize,
    /// Output-queue consumers (forced to 0 with the push bit).
    pub right_process: usize,
    /// Loop iterations before a center/right worker recycles itself.
    pub max_executions: u64,
    /// Hashed into the queue keys.
    pub queue_name: String,
    /// Directory for spilled payloads.
    pub temp_dir: PathBuf,
    /// Payloads above this many bytes are spilled to `temp_dir`.
    pub spill_threshold: usize,
    /// Length of one master tick, in milliseconds.
    pub tick_ms: u64,
    /// Event bus ring size.
    pub bus_capacity: usize,
    /// Sleep before a failed worker exits. `None` means one constant tick.
    #[serde(skip)]
    pub failure_backoff: Option<BackoffPolicy>,
}

impl Default for PipelineConfig {
    /// - `mode = DAEMON | ASSEMBLY_LINE`
    /// - no workers of any role
    /// - `max_executions = 16000`
    /// - `spill_threshold = 8000` (fits the default SysV `msgmax` of 8192)
    /// - `tick_ms = 1000`
    fn default() -> Self {
        Self {
            name: "pipevisor".to_string(),
            mode: Mode::default(),
            left_process: 0,
            center_process: 0,
            right_process: 0,
            max_executions: 16_000,
            queue_name: String::new(),
            temp_dir: std::env::temp_dir(),
            spill_threshold: 8_000,
            tick_ms: 1_000,
            bus_capacity: 1_024,
            failure_backoff: None,
        }
    }
}

impl PipelineConfig {
    /// Parses a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(src: &str) -> Result<Self, PipelineError> {
        toml::from_str(src).map_err(|e| PipelineError::Config(e.to_string()))
    }

    /// Reads and parses a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let src = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&src)
    }

    /// Returns a copy with the mode rules applied to the process counts.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let mut cfg = self.clone();
        if !cfg.mode.is_daemon() {
            cfg.left_process = 1;
        }
        if cfg.mode.is_push() {
            cfg.right_process = 0;
        }
        cfg.max_executions = cfg.max_executions.max(1);
        cfg
    }

    /// Configured process count for `role`.
    pub fn count(&self, role: Role) -> usize {
        match role {
            Role::Left => self.left_process,
            Role::Center => self.center_process,
            Role::Right => self.right_process,
        }
    }

    /// Total number of worker processes.
    pub fn total_processes(&self) -> usize {
        Role::ALL.into_iter().map(|role| self.count(role)).sum()
    }

    #[inline]
    pub fn is_daemon(&self) -> bool {
        self.mode.is_daemon()
    }

    #[inline]
    pub fn is_push(&self) -> bool {
        self.mode.is_push()
    }

    /// One master tick (at least 1ms).
    #[inline]
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    /// Effective failure backoff.
    pub fn failure_backoff(&self) -> BackoffPolicy {
        self.failure_backoff
            .unwrap_or_else(|| BackoffPolicy::constant(self.tick()))
    }

    /// Bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}
