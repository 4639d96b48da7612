//! The backend contract C10 dispatches to: one of `InProcess`, `Subprocess`,
//! or `WorkerPool`, injected into the façade at construction time (spec
//! §4.10 step 3). Concrete backends (`kb-subprocess`, `kb-worker-pool`, and
//! an in-process backend built on `kb-handler`) each implement this trait
//! and live in their own crates — the façade never names them, so adding a
//! backend never touches this crate.

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use kb_core::error::PluginError;
use kb_core::ExecutionRequest;

/// What a backend produced, before the façade wraps it into an
/// [`kb_core::ExecutionResult`].
#[derive(Debug, Clone)]
pub struct BackendOutcome {
    /// The handler's raw return value (already metadata-enriched by C5 for
    /// the in-process/subprocess/worker-pool backends, since all three
    /// route through the same runner).
    pub data: Value,
    /// Backend-specific detail merged into `ExecutionMetadata.execution_meta`
    /// (worker id, pid, recycle count, …).
    pub execution_meta: Value,
}

/// A strategy for running one [`ExecutionRequest`] to completion.
///
/// Implementors own their own resource lifecycle (subprocess fork, worker
/// acquisition, …); the façade's only responsibility is to call `execute`
/// with an effective timeout already folded into `cancellation` and to
/// time the call for `executionTimeMs`.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// The wire name of this backend, used verbatim as
    /// `ExecutionMetadata.backend` (`"in-process"`, `"subprocess"`,
    /// `"worker-pool"`).
    fn name(&self) -> &'static str;

    /// Run `request`, observing `cancellation` for both externally-driven
    /// abort and the façade's own timeout enforcement.
    async fn execute(
        &self,
        request: ExecutionRequest,
        cancellation: CancellationToken,
    ) -> Result<BackendOutcome, PluginError>;
}
