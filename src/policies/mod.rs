//! Failure backoff policies.
//!
//! ## Contents
//! - [`BackoffPolicy`] how long a failed worker sleeps before exiting (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization so a failing role does not refork in lockstep
//!
//! ## Wiring
//! ```text
//! PipelineConfig.failure_backoff ──► RunSettings ──► run_worker:
//!     on failure: sleep(backoff.next(slot_failure_streak)) then exit
//! ```
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → constant 1s, jitter=None.
//! - `PipelineConfig::default()` derives it from `tick_ms`.

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
