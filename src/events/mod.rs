//! Runtime events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publisher**: the `Supervisor` (pool changes, drains, signal escalations)
//!   and `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the supervisor's listener task, which fans out to the
//!   `SubscriberSet`, plus any receiver obtained from `Supervisor::bus`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
