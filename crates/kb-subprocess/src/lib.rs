//! C6: one-shot subprocess execution over a per-execution IPC socket.
//!
//! Implements [`kb_exec::ExecutionBackend`] by spawning a fresh bootstrap
//! child per execution and tearing it down afterward — no worker reuse,
//! no pooling (that is `kb-worker-pool`'s job, C7).

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod backend;
mod bootstrap_request;
mod kill;
mod worker_bootstrap_config;

pub use backend::SubprocessBackend;
pub use bootstrap_request::BootstrapRequest;
pub use kill::terminate;
pub use worker_bootstrap_config::WorkerBootstrapConfig;
