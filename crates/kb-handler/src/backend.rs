//! The in-process [`kb_exec::ExecutionBackend`]: runs a handler in this same
//! process rather than spawning a subprocess or dispatching to a pooled
//! worker, per spec §4.10's `InProcess` backend option.
//!
//! Grounded directly on `kb-bootstrap`'s own one-shot execution path
//! (`handle_one_execution`/`run_persistent`'s single-handler body): the
//! context assembly, `kb_handler::run` call, and `{exitCode, data, meta}`
//! wrapping are identical, minus the IPC round trip.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use kb_context::factory::{self, ContextInputs};
use kb_core::error::PluginError;
use kb_core::ExecutionRequest;
use kb_exec::{BackendOutcome, ExecutionBackend};
use kb_platform::PlatformAdapter;

use crate::registry::HandlerRegistry;

/// Runs every execution on the caller's own tokio runtime, resolving
/// handlers from a [`HandlerRegistry`] populated at startup.
///
/// Unlike `kb-subprocess`/`kb-worker-pool`, this backend shares its process
/// with the host adapter that calls it — there is no sandbox boundary here
/// beyond whatever C1/C2 already enforce through [`kb_context`]'s facades.
pub struct InProcessBackend {
    registry: Arc<HandlerRegistry>,
    platform_adapter: Arc<dyn PlatformAdapter>,
}

impl InProcessBackend {
    /// Build a backend that resolves handlers from `registry` and hands
    /// every execution's [`kb_platform::GovernedPlatform`] the same
    /// `platform_adapter`.
    #[must_use]
    pub fn new(registry: Arc<HandlerRegistry>, platform_adapter: Arc<dyn PlatformAdapter>) -> Self {
        Self {
            registry,
            platform_adapter,
        }
    }
}

#[async_trait]
impl ExecutionBackend for InProcessBackend {
    fn name(&self) -> &'static str {
        "in-process"
    }

    async fn execute(
        &self,
        request: ExecutionRequest,
        cancellation: CancellationToken,
    ) -> Result<BackendOutcome, PluginError> {
        let handler = self.registry.resolve(
            &request.descriptor.plugin_id,
            &request.handler_ref,
            request.export_name.as_deref(),
        )?;

        let cwd = PathBuf::from(&request.workspace);
        let inputs = ContextInputs {
            platform_adapter: self.platform_adapter.clone(),
            outdir: Some(cwd.join(".kb").join("output")),
            cwd,
            signal: Some(cancellation.clone()),
            http: reqwest::Client::new(),
        };
        let build = factory::build(&request.descriptor, inputs);
        let mut context = build.context;
        let mut cleanup = build.cleanup;
        context.signal = cancellation;

        let output = crate::runner::run(handler.as_ref(), &context, request.input, &mut cleanup).await?;

        Ok(BackendOutcome {
            data: json!({
                "exitCode": output.exit_code,
                "data": output.data,
                "meta": output.meta,
            }),
            execution_meta: json!({ "backend": "in-process" }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kb_core::descriptor::{HandlerRef, HostContext, PluginContextDescriptor};
    use kb_core::permission::PermissionSpec;
    use kb_core::HostType;
    use kb_platform::NoopPlatformAdapter;
    use std::collections::HashMap;

    use crate::output::HandlerOutput;
    use crate::registry::Handler;
    use kb_context::PluginContext;
    use serde_json::Value;

    struct EchoHandler;

    #[async_trait]
    impl Handler for EchoHandler {
        async fn execute(&self, _context: &PluginContext, input: Value) -> Result<HandlerOutput, PluginError> {
            Ok(HandlerOutput {
                exit_code: None,
                data: Some(input),
                meta: None,
            })
        }
    }

    fn sample_request(workspace: &str) -> ExecutionRequest {
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
            workspace: workspace.into(),
            timeout_ms: None,
            target: None,
            export_name: None,
            invoke_chain: None,
        }
    }

    #[tokio::test]
    async fn resolved_handler_runs_and_wraps_exit_code_and_data() {
        let mut registry = HandlerRegistry::new();
        let handler_ref = HandlerRef {
            file: "handlers/main.ts".into(),
            export: "run".into(),
        };
        registry.register("demo", &handler_ref, Arc::new(EchoHandler));
        let backend = InProcessBackend::new(Arc::new(registry), Arc::new(NoopPlatformAdapter));

        let workspace = tempfile::tempdir().unwrap();
        let request = sample_request(&workspace.path().display().to_string());
        let outcome = backend
            .execute(request, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.execution_meta["backend"], "in-process");
        assert_eq!(outcome.data["exitCode"], Value::Null);
        assert_eq!(outcome.data["data"]["a"], 1);
    }

    #[tokio::test]
    async fn unresolved_handler_fails_before_context_assembly() {
        let backend = InProcessBackend::new(Arc::new(HandlerRegistry::new()), Arc::new(NoopPlatformAdapter));
        let workspace = tempfile::tempdir().unwrap();
        let request = sample_request(&workspace.path().display().to_string());

        let error = backend
            .execute(request, CancellationToken::new())
            .await
            .expect_err("unregistered handler must fail");
        assert_eq!(error.code, kb_core::error::ErrorCode::HandlerNotFound);
    }
}
