//! C7: the long-lived worker pool backend.
//!
//! A pool of persistent `kb-bootstrap --persistent` children, each bound to
//! its own Unix-domain-socket [`kb_ipc`] channel and serving one request at a
//! time across many `execute` frames. Admission, queueing, per-plugin quotas,
//! recycling, and health checks are all owned by a single actor task (see
//! [`pool`]'s module doc); workers themselves are the unit of subprocess
//! lifecycle ([`Worker`]).

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod conn;
mod pool;
mod stats;
mod worker;

pub use pool::{WorkerPool, WorkerPoolBuilder};
pub use stats::{PoolStats, PoolStatsSnapshot};
pub use worker::{Worker, WorkerState};
