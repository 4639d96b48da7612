//! Shared wire types for the kb plugin execution runtime.
//!
//! This crate carries no behavior of its own — it is the vocabulary every
//! other crate in the workspace speaks: the request/result envelope, the
//! permission lattice a manifest declares, the descriptor that crosses the
//! IPC boundary, and the normalized error taxonomy every subsystem folds
//! its failures into.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod descriptor;
pub mod envelope;
pub mod error;
pub mod host;
pub mod ids;
pub mod permission;
pub mod prelude;

pub use descriptor::{HandlerRef, HostContext, PluginContextDescriptor};
pub use envelope::{ExecutionMetadata, ExecutionRequest, ExecutionResult, InvokeChain, InvokeTarget};
pub use error::{ErrorCode, PluginError};
pub use host::HostType;
pub use ids::{new_id, IdKind};
pub use permission::{
    EnvPermissions, FsPermissions, InvokePermissions, NetworkPermissions, PermissionSpec,
    PlatformPermissions,
};
