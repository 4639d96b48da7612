//! The governance proxy C3 wraps every platform adapter in: each call is
//! pre-checked against `permissions.platform.*` and only reaches the inner
//! adapter if the check passes, per spec §4.3.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use kb_core::error::{ErrorCode, PluginError};
use kb_core::PlatformPermissions;

use crate::adapter::{ExecutionStats, PlatformAdapter, RunStatus};

fn platform_denied(operation: &str) -> PluginError {
    PluginError::new(
        ErrorCode::PermissionDenied,
        format!("platform.{operation} is not granted"),
    )
    .with_details(serde_json::json!({ "operation": operation }))
}

/// Wraps a [`PlatformAdapter`] so every call is gated by
/// `permissions.platform.*` before it reaches the real adapter.
pub struct GovernedPlatform {
    inner: Arc<dyn PlatformAdapter>,
    permissions: PlatformPermissions,
}

impl GovernedPlatform {
    /// Wrap `inner`, gating every call with `permissions`.
    #[must_use]
    pub fn new(inner: Arc<dyn PlatformAdapter>, permissions: PlatformPermissions) -> Self {
        Self { inner, permissions }
    }
}

#[async_trait]
impl PlatformAdapter for GovernedPlatform {
    async fn enqueue_workflow(&self, workflow_id: &str, input: Value) -> Result<String, PluginError> {
        if !self.permissions.workflows {
            return Err(platform_denied("workflows"));
        }
        self.inner.enqueue_workflow(workflow_id, input).await
    }

    async fn workflow_status(&self, run_id: &str) -> Result<RunStatus, PluginError> {
        if !self.permissions.workflows {
            return Err(platform_denied("workflows"));
        }
        self.inner.workflow_status(run_id).await
    }

    async fn enqueue_job(&self, job_id: &str, input: Value) -> Result<String, PluginError> {
        if !self.permissions.jobs {
            return Err(platform_denied("jobs"));
        }
        self.inner.enqueue_job(job_id, input).await
    }

    async fn job_status(&self, run_id: &str) -> Result<RunStatus, PluginError> {
        if !self.permissions.jobs {
            return Err(platform_denied("jobs"));
        }
        self.inner.job_status(run_id).await
    }

    async fn create_snapshot(&self, workspace_id: &str) -> Result<String, PluginError> {
        if !self.permissions.snapshot {
            return Err(platform_denied("snapshot"));
        }
        self.inner.create_snapshot(workspace_id).await
    }

    async fn restore_snapshot(&self, workspace_id: &str, snapshot_id: &str) -> Result<(), PluginError> {
        if !self.permissions.snapshot {
            return Err(platform_denied("snapshot"));
        }
        self.inner.restore_snapshot(workspace_id, snapshot_id).await
    }

    async fn execution_stats(&self) -> Result<ExecutionStats, PluginError> {
        if !self.permissions.execution {
            return Err(platform_denied("execution"));
        }
        self.inner.execution_stats().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::NoopPlatformAdapter;

    #[tokio::test]
    async fn ungranted_operation_is_denied_before_reaching_inner_adapter() {
        let governed = GovernedPlatform::new(
            Arc::new(NoopPlatformAdapter),
            PlatformPermissions::default(),
        );
        let err = governed
            .enqueue_workflow("wf-1", Value::Null)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::PermissionDenied);
    }

    #[tokio::test]
    async fn granted_operation_reaches_inner_adapter() {
        let governed = GovernedPlatform::new(
            Arc::new(NoopPlatformAdapter),
            PlatformPermissions {
                workflows: true,
                ..Default::default()
            },
        );
        let run_id = governed.enqueue_workflow("wf-1", Value::Null).await.unwrap();
        assert_eq!(run_id, "noop-run");
    }

    #[tokio::test]
    async fn each_platform_section_gates_independently() {
        let governed = GovernedPlatform::new(
            Arc::new(NoopPlatformAdapter),
            PlatformPermissions {
                jobs: true,
                ..Default::default()
            },
        );
        assert!(governed.enqueue_job("job-1", Value::Null).await.is_ok());
        assert!(governed.enqueue_workflow("wf-1", Value::Null).await.is_err());
        assert!(governed.create_snapshot("ws-1").await.is_err());
        assert!(governed.execution_stats().await.is_err());
    }
}
