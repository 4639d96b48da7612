//! [`IpcPlatformAdapter`]: the RPC-backed half of spec §3's "platform
//! adapter (possibly RPC-backed)" invariant on [`kb_context::PluginContext`].
//!
//! A subprocess/worker child has no direct access to the parent's concrete
//! platform adapters (a Redis cache, an LLM provider client, …), so its
//! `context.platform` is a [`kb_platform::GovernedPlatform`] wrapping *this*
//! adapter, which forwards every call across the socket as an
//! `adapter:call` frame with `adapter = "platform"` and round-trips the
//! parent's in-process [`kb_platform::PlatformAdapter`] answer back as the
//! RPC result.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use kb_core::error::{ErrorCode, PluginError};
use kb_platform::{ExecutionStats, PlatformAdapter, RunStatus};

use crate::client::IpcClient;
use crate::wire::Frame;

/// Forwards every [`PlatformAdapter`] call to the parent over an
/// [`IpcClient`]'s `adapter:call`/`adapter:response` frames.
pub struct IpcPlatformAdapter {
    client: Arc<IpcClient>,
}

impl IpcPlatformAdapter {
    /// Build an adapter bound to `client`.
    #[must_use]
    pub fn new(client: Arc<IpcClient>) -> Self {
        Self { client }
    }

    async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, PluginError> {
        let request_id = kb_core::new_id(kb_core::IdKind::Request);
        let frame = Frame::AdapterCall {
            request_id,
            adapter: "platform".to_string(),
            method: method.to_string(),
            args,
            timeout: None,
        };
        match self.client.call(frame).await? {
            Frame::AdapterResponse {
                result: Some(result),
                ..
            } => Ok(result),
            Frame::AdapterResponse {
                error: Some(error), ..
            } => Err(error),
            other => Err(PluginError::new(
                ErrorCode::PlatformError,
                format!("unexpected ipc response frame for adapter call: {other:?}"),
            )),
        }
    }
}

fn expect_string(value: Value, method: &str) -> Result<String, PluginError> {
    value.as_str().map(str::to_string).ok_or_else(|| {
        PluginError::new(
            ErrorCode::PlatformError,
            format!("platform adapter '{method}' returned a non-string result"),
        )
    })
}

fn decode_status(value: Value, method: &str) -> Result<RunStatus, PluginError> {
    match value.as_str() {
        Some("pending") => Ok(RunStatus::Pending),
        Some("running") => Ok(RunStatus::Running),
        Some("completed") => Ok(RunStatus::Completed),
        Some("failed") => Ok(RunStatus::Failed),
        Some("cancelled") => Ok(RunStatus::Cancelled),
        _ => Err(PluginError::new(
            ErrorCode::PlatformError,
            format!("platform adapter '{method}' returned an unrecognized status"),
        )),
    }
}

#[async_trait]
impl PlatformAdapter for IpcPlatformAdapter {
    async fn enqueue_workflow(&self, workflow_id: &str, input: Value) -> Result<String, PluginError> {
        let result = self
            .call("enqueueWorkflow", vec![Value::String(workflow_id.to_string()), input])
            .await?;
        expect_string(result, "enqueueWorkflow")
    }

    async fn workflow_status(&self, run_id: &str) -> Result<RunStatus, PluginError> {
        let result = self
            .call("workflowStatus", vec![Value::String(run_id.to_string())])
            .await?;
        decode_status(result, "workflowStatus")
    }

    async fn enqueue_job(&self, job_id: &str, input: Value) -> Result<String, PluginError> {
        let result = self
            .call("enqueueJob", vec![Value::String(job_id.to_string()), input])
            .await?;
        expect_string(result, "enqueueJob")
    }

    async fn job_status(&self, run_id: &str) -> Result<RunStatus, PluginError> {
        let result = self
            .call("jobStatus", vec![Value::String(run_id.to_string())])
            .await?;
        decode_status(result, "jobStatus")
    }

    async fn create_snapshot(&self, workspace_id: &str) -> Result<String, PluginError> {
        let result = self
            .call("createSnapshot", vec![Value::String(workspace_id.to_string())])
            .await?;
        expect_string(result, "createSnapshot")
    }

    async fn restore_snapshot(&self, workspace_id: &str, snapshot_id: &str) -> Result<(), PluginError> {
        self.call(
            "restoreSnapshot",
            vec![
                Value::String(workspace_id.to_string()),
                Value::String(snapshot_id.to_string()),
            ],
        )
        .await?;
        Ok(())
    }

    async fn execution_stats(&self) -> Result<ExecutionStats, PluginError> {
        let result = self.call("executionStats", vec![]).await?;
        Ok(ExecutionStats {
            in_flight: result.get("inFlight").and_then(Value::as_u64).unwrap_or(0),
            queued: result.get("queued").and_then(Value::as_u64).unwrap_or(0),
            total_requests: result
                .get("totalRequests")
                .and_then(Value::as_u64)
                .unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::AdapterDispatch;
    use crate::server::IpcServer;
    use std::path::PathBuf;
    use tempfile::tempdir;

    struct FixedAdapter;

    #[async_trait]
    impl AdapterDispatch for FixedAdapter {
        async fn dispatch(&self, adapter: &str, method: &str, args: Vec<Value>) -> Result<Value, PluginError> {
            assert_eq!(adapter, "platform");
            match method {
                "enqueueWorkflow" => Ok(Value::String("run-1".into())),
                "workflowStatus" => Ok(Value::String("completed".into())),
                "executionStats" => Ok(serde_json::json!({"inFlight": 2, "queued": 1, "totalRequests": 9})),
                other => panic!("unexpected method: {other} args={args:?}"),
            }
        }
    }

    async fn bound_adapter(dir: &tempfile::TempDir) -> IpcPlatformAdapter {
        let sock_path: PathBuf = dir.path().join("platform.sock");
        let server = IpcServer::bind(&sock_path, Some(Arc::new(FixedAdapter))).unwrap();
        tokio::spawn(async move {
            let _channel = server.accept().await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        });
        let client = Arc::new(IpcClient::new(sock_path));
        IpcPlatformAdapter::new(client)
    }

    #[tokio::test]
    async fn forwards_enqueue_workflow_and_decodes_result() {
        let dir = tempdir().unwrap();
        let adapter = bound_adapter(&dir).await;
        let run_id = adapter.enqueue_workflow("wf-1", Value::Null).await.unwrap();
        assert_eq!(run_id, "run-1");
    }

    #[tokio::test]
    async fn decodes_run_status() {
        let dir = tempdir().unwrap();
        let adapter = bound_adapter(&dir).await;
        let status = adapter.workflow_status("run-1").await.unwrap();
        assert_eq!(status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn decodes_execution_stats() {
        let dir = tempdir().unwrap();
        let adapter = bound_adapter(&dir).await;
        let stats = adapter.execution_stats().await.unwrap();
        assert_eq!(stats.in_flight, 2);
        assert_eq!(stats.queued, 1);
        assert_eq!(stats.total_requests, 9);
    }
}
