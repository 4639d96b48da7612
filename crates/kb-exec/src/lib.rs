//! C10: the execution façade — the single entrypoint host adapters call.
//!
//! Orchestrates target resolution, workspace leasing, degradation advisory,
//! and backend dispatch (one of `InProcess`/`Subprocess`/`WorkerPool`,
//! injected at construction time), then assembles the `ExecutionResult`
//! envelope. This crate fixes the `ExecutionBackend`/`WorkspaceManager`/
//! `DegradationAdvisor` contracts so the concrete backend and degradation
//! crates can depend on it without it ever depending back on them.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod backend;
mod degradation;
mod facade;
mod lease;
mod target;

pub use backend::{BackendOutcome, ExecutionBackend};
pub use degradation::{Advisory, DegradationAdvisor, NoopDegradationAdvisor};
pub use facade::ExecutionFacade;
pub use lease::{LocalWorkspaceManager, WorkspaceLease, WorkspaceManager};
pub use target::{AlwaysActiveRegistry, EnvironmentRegistry, EnvironmentState, WorkspaceState};
