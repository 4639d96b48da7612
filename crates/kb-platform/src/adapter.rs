//! The platform adapter interface: workflows, jobs, snapshots, and execution
//! introspection, as seen from inside a plugin handler via `context.platform`.
//!
//! Concrete adapters (backed by `KB_WORKFLOW_SERVICE_URL` or an in-process
//! implementation) live outside this crate; this module only fixes the
//! contract and the fallback no-op doubles used in tests.

use async_trait::async_trait;
use serde_json::Value;

use kb_core::error::PluginError;

/// Status of a workflow or job, as reported by the platform service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// Queued but not yet started.
    Pending,
    /// Currently executing.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Cancelled before completion.
    Cancelled,
}

/// A snapshot of the current execution subsystem's load, for
/// `platform.execution` introspection.
#[derive(Debug, Clone, Default)]
pub struct ExecutionStats {
    /// Requests currently in flight across all backends.
    pub in_flight: u64,
    /// Requests waiting in a worker-pool queue.
    pub queued: u64,
    /// Total requests served since startup.
    pub total_requests: u64,
}

/// The platform surface a plugin handler may call through `context.platform`,
/// per spec §3/§4.3. Every method here is expected to be wrapped by a
/// [`crate::governance::GovernedPlatform`] before being handed to a handler —
/// this trait itself performs no authorization.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Enqueue a workflow run, returning its run id.
    async fn enqueue_workflow(&self, workflow_id: &str, input: Value) -> Result<String, PluginError>;

    /// Query a previously enqueued workflow run's status.
    async fn workflow_status(&self, run_id: &str) -> Result<RunStatus, PluginError>;

    /// Enqueue a job, returning its run id.
    async fn enqueue_job(&self, job_id: &str, input: Value) -> Result<String, PluginError>;

    /// Query a previously enqueued job's status.
    async fn job_status(&self, run_id: &str) -> Result<RunStatus, PluginError>;

    /// Request a workspace snapshot, returning its id.
    async fn create_snapshot(&self, workspace_id: &str) -> Result<String, PluginError>;

    /// Restore a workspace to a previously captured snapshot.
    async fn restore_snapshot(&self, workspace_id: &str, snapshot_id: &str) -> Result<(), PluginError>;

    /// Read the execution subsystem's current load.
    async fn execution_stats(&self) -> Result<ExecutionStats, PluginError>;
}

/// A no-op adapter that succeeds trivially — used in tests and for
/// `platform.*` operations a deployment has not wired a real backend for.
pub struct NoopPlatformAdapter;

#[async_trait]
impl PlatformAdapter for NoopPlatformAdapter {
    async fn enqueue_workflow(&self, _workflow_id: &str, _input: Value) -> Result<String, PluginError> {
        Ok("noop-run".to_string())
    }

    async fn workflow_status(&self, _run_id: &str) -> Result<RunStatus, PluginError> {
        Ok(RunStatus::Completed)
    }

    async fn enqueue_job(&self, _job_id: &str, _input: Value) -> Result<String, PluginError> {
        Ok("noop-run".to_string())
    }

    async fn job_status(&self, _run_id: &str) -> Result<RunStatus, PluginError> {
        Ok(RunStatus::Completed)
    }

    async fn create_snapshot(&self, _workspace_id: &str) -> Result<String, PluginError> {
        Ok("noop-snapshot".to_string())
    }

    async fn restore_snapshot(&self, _workspace_id: &str, _snapshot_id: &str) -> Result<(), PluginError> {
        Ok(())
    }

    async fn execution_stats(&self) -> Result<ExecutionStats, PluginError> {
        Ok(ExecutionStats::default())
    }
}
