//! Convenience re-exports for downstream crates.

pub use crate::descriptor::{HandlerRef, HostContext, PluginContextDescriptor};
pub use crate::envelope::{ExecutionMetadata, ExecutionRequest, ExecutionResult, InvokeChain, InvokeTarget};
pub use crate::error::{ErrorCode, PluginError};
pub use crate::host::HostType;
pub use crate::ids::{new_id, IdKind};
pub use crate::permission::PermissionSpec;
