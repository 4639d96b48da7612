//! C10: the single entrypoint host adapters call. Orchestrates target
//! resolution, workspace leasing, degradation advisory, and backend
//! dispatch, and assembles the `ExecutionResult` envelope (spec §4.10).

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use kb_core::error::{ErrorCode, PluginError};
use kb_core::{ExecutionMetadata, ExecutionRequest, ExecutionResult};

use crate::backend::ExecutionBackend;
use crate::degradation::{Advisory, DegradationAdvisor};
use crate::lease::WorkspaceManager;
use crate::target::{resolve_target, EnvironmentRegistry};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Orchestrates C1-C9 behind a single `execute` call, per spec §4.10.
///
/// The façade never names a concrete backend type — `backend` is whichever
/// of `InProcess`/`Subprocess`/`WorkerPool` the deployment wired in at
/// construction time.
pub struct ExecutionFacade {
    backend: Arc<dyn ExecutionBackend>,
    workspace_manager: Arc<dyn WorkspaceManager>,
    degradation: Arc<dyn DegradationAdvisor>,
    environment_registry: Arc<dyn EnvironmentRegistry>,
}

impl ExecutionFacade {
    /// Wire a façade to a concrete backend and its collaborators.
    #[must_use]
    pub fn new(
        backend: Arc<dyn ExecutionBackend>,
        workspace_manager: Arc<dyn WorkspaceManager>,
        degradation: Arc<dyn DegradationAdvisor>,
        environment_registry: Arc<dyn EnvironmentRegistry>,
    ) -> Self {
        Self {
            backend,
            workspace_manager,
            degradation,
            environment_registry,
        }
    }

    /// Run `request` to completion. Never returns `Err` — every failure
    /// path, including ones that occur before a backend is even selected,
    /// is folded into an `ExecutionResult::Failure` so host adapters have a
    /// single shape to render.
    pub async fn execute(&self, request: ExecutionRequest, signal: CancellationToken) -> ExecutionResult {
        let started = Instant::now();
        let workspace_id = request.workspace.clone();
        let plugin_root = request.plugin_root.clone();
        let target = request.target.clone();

        let mut metadata = ExecutionMetadata {
            backend: self.backend.name().to_string(),
            workspace_id: workspace_id.clone(),
            execution_meta: serde_json::Value::Null,
            target: target.clone(),
        };

        // Step 1: resolve target + verify environment/workspace state.
        if let Err(error) = resolve_target(target.as_ref(), &workspace_id, self.environment_registry.as_ref()).await {
            return failure(error, started, metadata);
        }

        // Step 2: acquire the workspace lease.
        let lease = match self.workspace_manager.acquire(&workspace_id, &plugin_root).await {
            Ok(lease) => lease,
            Err(error) => return failure(error, started, metadata),
        };

        // Step 4: consult the degradation controller before dispatch.
        match self.degradation.advise().await {
            Advisory::Proceed => {}
            Advisory::Delay(delay) => tokio::time::sleep(delay).await,
            Advisory::Reject => {
                self.release_lease(&lease).await;
                let error = PluginError::new(
                    ErrorCode::InternalError,
                    "execution rejected: system is in a critical degradation state",
                )
                .with_details(serde_json::json!({ "reason": "degradation-reject" }));
                return failure(error, started, metadata);
            }
        }

        // Step 5: run the backend under the effective timeout.
        let timeout = request
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_TIMEOUT);
        let outcome = self.run_with_timeout(request, signal.clone(), timeout).await;

        // Step 7: guaranteed-release scope.
        self.release_lease(&lease).await;

        let execution_time_ms = elapsed_ms(started);
        match outcome {
            Ok(outcome) => {
                metadata.execution_meta = outcome.execution_meta;
                ExecutionResult::Success {
                    data: outcome.data,
                    execution_time_ms,
                    metadata,
                }
            }
            Err(error) => ExecutionResult::Failure {
                error,
                execution_time_ms,
                metadata,
            },
        }
    }

    async fn run_with_timeout(
        &self,
        request: ExecutionRequest,
        signal: CancellationToken,
        timeout: Duration,
    ) -> Result<crate::backend::BackendOutcome, PluginError> {
        tokio::select! {
            result = self.backend.execute(request, signal.clone()) => result,
            () = tokio::time::sleep(timeout) => {
                signal.cancel();
                Err(PluginError::new(ErrorCode::TimeoutError, "execution timed out")
                    .with_retry_after_ms(timeout.as_millis() as u64))
            }
        }
    }

    async fn release_lease(&self, lease: &crate::lease::WorkspaceLease) {
        self.workspace_manager.release(lease).await;
    }
}

fn failure(error: PluginError, started: Instant, metadata: ExecutionMetadata) -> ExecutionResult {
    warn!(code = %error.code, message = %error.message, "execution failed before backend dispatch");
    ExecutionResult::Failure {
        error,
        execution_time_ms: elapsed_ms(started),
        metadata,
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or_else(|_| {
        error!("execution duration overflowed u64 milliseconds");
        u64::MAX
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendOutcome;
    use crate::degradation::NoopDegradationAdvisor;
    use crate::lease::LocalWorkspaceManager;
    use crate::target::AlwaysActiveRegistry;
    use async_trait::async_trait;
    use kb_core::descriptor::{HandlerRef, HostContext, PluginContextDescriptor};
    use kb_core::permission::PermissionSpec;
    use kb_core::HostType;
    use std::collections::HashMap;

    struct EchoBackend;

    #[async_trait]
    impl ExecutionBackend for EchoBackend {
        fn name(&self) -> &'static str {
            "in-process"
        }

        async fn execute(
            &self,
            request: ExecutionRequest,
            _cancellation: CancellationToken,
        ) -> Result<BackendOutcome, PluginError> {
            Ok(BackendOutcome {
                data: request.input,
                execution_meta: serde_json::json!({ "echoed": true }),
            })
        }
    }

    struct SleepForeverBackend;

    #[async_trait]
    impl ExecutionBackend for SleepForeverBackend {
        fn name(&self) -> &'static str {
            "subprocess"
        }

        async fn execute(
            &self,
            _request: ExecutionRequest,
            cancellation: CancellationToken,
        ) -> Result<BackendOutcome, PluginError> {
            cancellation.cancelled().await;
            Err(PluginError::new(ErrorCode::AbortError, "cancelled"))
        }
    }

    struct RejectingAdvisor;

    #[async_trait]
    impl DegradationAdvisor for RejectingAdvisor {
        async fn advise(&self) -> Advisory {
            Advisory::Reject
        }
    }

    fn sample_request() -> ExecutionRequest {
        ExecutionRequest {
            execution_id: "exec-1".into(),
            descriptor: PluginContextDescriptor {
                host_type: HostType::Cli,
                plugin_id: "demo".into(),
                plugin_version: "1.0.0".into(),
                request_id: "req-1".into(),
                trace_id: "trace-1".into(),
                span_id: "span-1".into(),
                invocation_id: "inv-1".into(),
                execution_id: "exec-1".into(),
                handler_id: "handlers/main.ts#run".into(),
                command_id: None,
                tenant_id: None,
                permissions: PermissionSpec::default(),
                host_context: HostContext::Cli {
                    argv: vec![],
                    flags: HashMap::new(),
                },
            },
            plugin_root: "plugins/demo".into(),
            handler_ref: HandlerRef {
                file: "handlers/main.ts".into(),
                export: "run".into(),
            },
            input: serde_json::json!({"a": 1}),
            workspace: "/t/workspace".into(),
            timeout_ms: None,
            target: None,
            export_name: None,
            invoke_chain: None,
        }
    }

    #[tokio::test]
    async fn successful_execution_assembles_success_envelope() {
        let facade = ExecutionFacade::new(
            Arc::new(EchoBackend),
            Arc::new(LocalWorkspaceManager),
            Arc::new(NoopDegradationAdvisor),
            Arc::new(AlwaysActiveRegistry),
        );
        let result = facade.execute(sample_request(), CancellationToken::new()).await;
        assert!(result.is_ok());
        match result {
            ExecutionResult::Success { data, metadata, .. } => {
                assert_eq!(data["a"], 1);
                assert_eq!(metadata.backend, "in-process");
                assert_eq!(metadata.workspace_id, "/t/workspace");
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn degradation_reject_short_circuits_before_backend_dispatch() {
        let facade = ExecutionFacade::new(
            Arc::new(SleepForeverBackend),
            Arc::new(LocalWorkspaceManager),
            Arc::new(RejectingAdvisor),
            Arc::new(AlwaysActiveRegistry),
        );
        let result = facade.execute(sample_request(), CancellationToken::new()).await;
        assert!(!result.is_ok());
    }

    #[tokio::test]
    async fn backend_timeout_surfaces_timeout_error_and_cancels_signal() {
        let facade = ExecutionFacade::new(
            Arc::new(SleepForeverBackend),
            Arc::new(LocalWorkspaceManager),
            Arc::new(NoopDegradationAdvisor),
            Arc::new(AlwaysActiveRegistry),
        );
        let mut request = sample_request();
        request.timeout_ms = Some(20);
        let result = facade.execute(request, CancellationToken::new()).await;
        match result {
            ExecutionResult::Failure { error, .. } => {
                assert_eq!(error.code, ErrorCode::TimeoutError);
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_target_fails_before_lease_is_acquired() {
        let facade = ExecutionFacade::new(
            Arc::new(EchoBackend),
            Arc::new(LocalWorkspaceManager),
            Arc::new(NoopDegradationAdvisor),
            Arc::new(AlwaysActiveRegistry),
        );
        let mut request = sample_request();
        request.target = Some(kb_core::InvokeTarget {
            namespace: String::new(),
            plugin_id: "other".into(),
            plugin_version: "1.0.0".into(),
            route: "GET /x".into(),
        });
        let result = facade.execute(request, CancellationToken::new()).await;
        match result {
            ExecutionResult::Failure { error, .. } => {
                assert_eq!(error.code, ErrorCode::TargetInvalid);
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
