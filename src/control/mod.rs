//! Shared control signal: the state machine value and the cross-process cell holding it.
//!
//! ## Contents
//! - [`ControlSignal`] escalation states and the respawn rule
//! - [`SignalCell`] single-writer / multi-reader shared memory cell

mod cell;
mod signal;

pub use cell::SignalCell;
pub use signal::ControlSignal;
