//! # Event subscribers.
//!
//! ```text
//! Supervisor ── publish(Event) ──► Bus ──► listener ──► SubscriberSet::emit
//!                                                          │
//!                                               ┌──────────┼──────────┐
//!                                               ▼          ▼          ▼
//!                                           LogWriter   Metrics    Custom
//! ```
//!
//! ## Contents
//! - [`Subscribe`] the subscriber trait
//! - [`SubscriberSet`] bounded, panic-isolated fan-out
//! - `LogWriter` built-in `tracing` renderer (feature `logging`)

#[cfg(feature = "logging")]
mod embedded;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use embedded::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
