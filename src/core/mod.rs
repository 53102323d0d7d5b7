//! Runtime core: the master process.
//!
//! The public entry point is [`Supervisor`], built through [`SupervisorBuilder`].
//!
//! Internal modules:
//! - [`config`]: pipeline configuration and run mode flags;
//! - [`pool`]: pid → worker slot table and failure streaks;
//! - [`spawn`]: forking a worker process for a slot;
//! - [`reap`]: non-blocking `waitpid` loop and wait-status decoding;
//! - [`drain`]: restart and stop drain decisions, one per tick;
//! - [`signals`]: OS signal streams consumed by the master;
//! - [`supervisor`]: the event loop tying the above together.

mod builder;
mod config;
mod drain;
mod pool;
mod reap;
mod signals;
mod spawn;
mod supervisor;

pub use builder::SupervisorBuilder;
pub use config::{Mode, PipelineConfig};
pub use drain::{DrainStep, DrainView, RestartDrain, StopDrain};
pub use pool::{PoolEntry, ProcessPool, Slot};
pub use reap::{Termination, reap_exited};
pub use spawn::{ForkSpawner, Spawn};
pub use supervisor::{Outcome, RunReport, Supervisor};
