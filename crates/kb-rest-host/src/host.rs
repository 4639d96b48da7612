//! The REST front-end's only contract with the execution subsystem: submit
//! an already-built [`ExecutionRequest`] and get back an [`ExecutionResult`],
//! per spec §1 ("their only contract here is the `ExecutionRequest` they
//! submit"). Mirrors `kb-cli-host::CliHost` exactly; the two front-ends
//! differ only in how they render the result, not in how they obtain it.

use std::sync::Arc;

use kb_core::{ExecutionRequest, ExecutionResult};
use kb_exec::ExecutionFacade;
use tokio_util::sync::CancellationToken;

/// Binds a [`ExecutionFacade`] to the REST front-end's submission contract.
pub struct RestHost {
    facade: Arc<ExecutionFacade>,
}

impl RestHost {
    /// Wrap a façade already wired to its backend/workspace/degradation
    /// collaborators.
    #[must_use]
    pub fn new(facade: Arc<ExecutionFacade>) -> Self {
        Self { facade }
    }

    /// Run `request` to completion, cancellable via `cancellation`.
    pub async fn submit(&self, request: ExecutionRequest, cancellation: CancellationToken) -> ExecutionResult {
        self.facade.execute(request, cancellation).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kb_core::descriptor::{HandlerRef, HostContext, PluginContextDescriptor};
    use kb_core::error::PluginError;
    use kb_core::permission::PermissionSpec;
    use kb_core::HostType;
    use kb_exec::{
        AlwaysActiveRegistry, BackendOutcome, ExecutionBackend, LocalWorkspaceManager, NoopDegradationAdvisor,
    };
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
                execution_meta: serde_json::json!({}),
            })
        }
    }

    fn sample_request() -> ExecutionRequest {
        ExecutionRequest {
            execution_id: "exec-1".into(),
            descriptor: PluginContextDescriptor {
                host_type: HostType::Rest,
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
                host_context: HostContext::Rest {
                    method: "POST".into(),
                    path: "/demo".into(),
                    headers: HashMap::new(),
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
    async fn submit_delegates_to_the_facade() {
        let facade = Arc::new(ExecutionFacade::new(
            Arc::new(EchoBackend),
            Arc::new(LocalWorkspaceManager),
            Arc::new(NoopDegradationAdvisor),
            Arc::new(AlwaysActiveRegistry),
        ));
        let host = RestHost::new(facade);
        let result = host.submit(sample_request(), CancellationToken::new()).await;
        assert!(result.is_ok());
    }
}
