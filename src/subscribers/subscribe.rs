//! # Core subscriber trait
//!
//! `Subscribe` is the extension point for reacting to master events (metrics,
//! alerting, audit logs). Each subscriber is driven by its own worker task fed
//! by a bounded queue owned by the [`SubscriberSet`](crate::SubscriberSet).
//!
//! ## Contract
//! - Implementations may be slow; they never block the master loop or other subscribers.
//! - On queue overflow events for that subscriber are **dropped** and a
//!   `SubscriberOverflow` event is published.
//! - Subscribers run inside the master's single-threaded runtime: prefer async
//!   I/O over blocking calls.
//!
//! ## Example
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use pipevisor::{Event, EventKind, Subscribe};
//!
//! #[derive(Default)]
//! struct CrashCounter(AtomicUsize);
//!
//! #[async_trait::async_trait]
//! impl Subscribe for CrashCounter {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::WorkerExited && ev.exit_code != Some(0) {
//!             self.0.fetch_add(1, Ordering::Relaxed);
//!         }
//!     }
//!     fn name(&self) -> &'static str { "crash-counter" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Contract for event subscribers.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles a single event.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this subscriber's queue.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
