//! # Built-in subscribers
//!
//! - [`LogWriter`]: renders master events through `tracing`.

mod log;

pub use log::LogWriter;
