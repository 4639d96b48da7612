//! Step 1 of the façade (spec §4.10): normalize `target.namespace` and
//! verify the referenced environment/workspace are in an acceptable state,
//! before a lease is even attempted.

use async_trait::async_trait;

use kb_core::error::{ErrorCode, PluginError};
use kb_core::InvokeTarget;

/// Lifecycle state of an execution environment, as tracked by whatever
/// registry a deployment wires in (out of scope per spec §1 — this crate
/// only fixes the contract a registry must satisfy).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentState {
    /// Accepting executions.
    Active,
    /// Shutting down; no new executions accepted.
    Terminated,
    /// Failed to provision or crashed; no new executions accepted.
    Failed,
}

/// Lifecycle state of a workspace, as tracked by the same registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceState {
    /// Available for lease.
    Active,
    /// Provisioning or a prior operation failed.
    Failed,
    /// Released and no longer available.
    Released,
}

/// Looks up environment/workspace lifecycle state for step 1's
/// acceptable-state check. A deployment with no remote environment registry
/// (the common case for the local workspace manager) wires in
/// [`AlwaysActiveRegistry`].
#[async_trait]
pub trait EnvironmentRegistry: Send + Sync {
    /// Current state of the named environment.
    async fn environment_state(&self, namespace: &str) -> EnvironmentState;

    /// Current state of the named workspace.
    async fn workspace_state(&self, workspace_id: &str) -> WorkspaceState;
}

/// A registry that reports every environment and workspace as active —
/// correct whenever there is no remote environment/workspace lifecycle to
/// track (the local, single-tenant deployment shape).
pub struct AlwaysActiveRegistry;

#[async_trait]
impl EnvironmentRegistry for AlwaysActiveRegistry {
    async fn environment_state(&self, _namespace: &str) -> EnvironmentState {
        EnvironmentState::Active
    }

    async fn workspace_state(&self, _workspace_id: &str) -> WorkspaceState {
        WorkspaceState::Active
    }
}

/// Validate `target` (if present) and the workspace's current state,
/// per spec §4.10 step 1.
pub async fn resolve_target(
    target: Option<&InvokeTarget>,
    workspace_id: &str,
    registry: &dyn EnvironmentRegistry,
) -> Result<(), PluginError> {
    if let Some(target) = target {
        if target.namespace.trim().is_empty() {
            return Err(PluginError::new(
                ErrorCode::TargetInvalid,
                "invoke target namespace is required when a target is specified",
            ));
        }
        match registry.environment_state(&target.namespace).await {
            EnvironmentState::Active => {}
            state => {
                return Err(PluginError::new(
                    ErrorCode::EnvironmentNotAvailable,
                    format!("environment '{}' is {:?}", target.namespace, state),
                ));
            }
        }
    }

    match registry.workspace_state(workspace_id).await {
        WorkspaceState::Active => Ok(()),
        state => Err(PluginError::new(
            ErrorCode::WorkspaceNotAvailable,
            format!("workspace '{workspace_id}' is {:?}", state),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_target_skips_namespace_check() {
        let result = resolve_target(None, "/t/ws", &AlwaysActiveRegistry).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn empty_namespace_is_target_invalid() {
        let target = InvokeTarget {
            namespace: String::new(),
            plugin_id: "demo".into(),
            plugin_version: "1.0.0".into(),
            route: "GET /x".into(),
        };
        let err = resolve_target(Some(&target), "/t/ws", &AlwaysActiveRegistry)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::TargetInvalid);
    }

    struct FailedEnvironmentRegistry;

    #[async_trait]
    impl EnvironmentRegistry for FailedEnvironmentRegistry {
        async fn environment_state(&self, _namespace: &str) -> EnvironmentState {
            EnvironmentState::Failed
        }

        async fn workspace_state(&self, _workspace_id: &str) -> WorkspaceState {
            WorkspaceState::Active
        }
    }

    #[tokio::test]
    async fn failed_environment_is_not_available() {
        let target = InvokeTarget {
            namespace: "ns-1".into(),
            plugin_id: "demo".into(),
            plugin_version: "1.0.0".into(),
            route: "GET /x".into(),
        };
        let err = resolve_target(Some(&target), "/t/ws", &FailedEnvironmentRegistry)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::EnvironmentNotAvailable);
    }
}
