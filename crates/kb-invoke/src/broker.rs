//! C8: orchestrates a single cross-plugin invoke call end to end — parse,
//! authorize, chain-limit, resolve, hand off to C10, record a trace span.
//!
//! Grounded on `astrid-capsule/src/dispatcher.rs`'s topic/pattern matching
//! and dispatch-loop shape, and `astrid-approval/src/interceptor/mod.rs`'s
//! ordered interceptor chain deciding allow/deny before anything runs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use kb_core::error::{ErrorCode, PluginError};
use kb_core::ids::{new_id, IdKind};
use kb_core::{
    ExecutionMetadata, ExecutionRequest, ExecutionResult, InvokeChain, InvokePermissions,
    InvokeTarget as WireInvokeTarget, PluginContextDescriptor,
};
use kb_exec::ExecutionFacade;
use kb_permissions::invoke::{invoke_decision, InvokeTargetRef};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::chain::{advance_chain, ChainDenyReason, InvokeLimits};
use crate::registry::{EmptyPluginRegistry, PluginRegistry};
use crate::target::parse_target;
use crate::trace::{NoopTraceRecorder, TraceRecorder, TraceSpan};

struct FanOutGuard {
    counter: Arc<AtomicUsize>,
}

impl Drop for FanOutGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// The C8 invoke broker.
pub struct InvokeBroker {
    facade: Arc<ExecutionFacade>,
    registry: Arc<dyn PluginRegistry>,
    trace_recorder: Arc<dyn TraceRecorder>,
    limits: InvokeLimits,
    fan_out: DashMap<String, Arc<AtomicUsize>>,
}

impl InvokeBroker {
    /// Build a broker over `facade`, with no plugins registered and default
    /// chain limits — callers generally want [`Self::with_limits`] and
    /// [`Self::with_registry`] wired to something real.
    #[must_use]
    pub fn new(facade: Arc<ExecutionFacade>) -> Self {
        Self {
            facade,
            registry: Arc::new(EmptyPluginRegistry),
            trace_recorder: Arc::new(NoopTraceRecorder),
            limits: InvokeLimits::default(),
            fan_out: DashMap::new(),
        }
    }

    /// Replace the plugin registry.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<dyn PluginRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Replace the trace recorder.
    #[must_use]
    pub fn with_trace_recorder(mut self, recorder: Arc<dyn TraceRecorder>) -> Self {
        self.trace_recorder = recorder;
        self
    }

    /// Override the default chain limits.
    #[must_use]
    pub fn with_limits(mut self, limits: InvokeLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Invoke `raw_target` on behalf of `caller`, authorized against
    /// `caller_invoke_permissions`.
    ///
    /// `current_chain` is the caller's own chain state (`None` when the
    /// caller itself is a root, non-chained execution) — threading this
    /// through from the executing handler's own `ExecutionRequest` is the
    /// responsibility of whatever bridges a handler's `context.api.invoke`
    /// call down to this broker (e.g. the IPC `adapter:call` dispatcher).
    ///
    /// `now_ms` is Unix epoch milliseconds, supplied by the caller rather
    /// than read internally, matching how this workspace threads time
    /// through the rest of its pure-orchestration code.
    #[allow(clippy::too_many_arguments)]
    pub async fn invoke(
        &self,
        caller: &PluginContextDescriptor,
        caller_invoke_permissions: &InvokePermissions,
        current_chain: Option<&InvokeChain>,
        raw_target: &str,
        namespace: String,
        input: Value,
        timeout_ms: Option<u64>,
        now_ms: i64,
        signal: CancellationToken,
    ) -> ExecutionResult {
        let parsed = match parse_target(raw_target) {
            Ok(parsed) => parsed,
            Err(error) => {
                return failure(
                    PluginError::new(ErrorCode::TargetInvalid, error.to_string()),
                    stub_metadata(),
                )
            }
        };

        let target_ref = InvokeTargetRef {
            plugin_id: &parsed.plugin_id,
            plugin_version: &parsed.plugin_version,
            method: &parsed.method,
            path: &parsed.path,
        };

        if let Err(reason) = invoke_decision(caller_invoke_permissions, &target_ref) {
            return failure(
                PluginError::permission_denied(
                    format!("invoke denied: {}", reason.as_str()),
                    target_ref.exact_target(),
                ),
                stub_metadata(),
            );
        }

        let chain = match advance_chain(current_chain, &caller.plugin_id, &parsed.plugin_id, &self.limits, now_ms) {
            Ok(chain) => chain,
            Err(reason) => return failure(chain_error(reason), stub_metadata()),
        };

        let fan_out_guard = match self.acquire_fan_out(&caller.execution_id) {
            Ok(guard) => guard,
            Err(reason) => return failure(chain_error(reason), stub_metadata()),
        };

        let resolved_plugin = match self
            .registry
            .resolve_plugin(&parsed.plugin_id, &parsed.plugin_version)
            .await
        {
            Some(resolved) => resolved,
            None => {
                return failure(
                    PluginError::new(
                        ErrorCode::PluginNotFound,
                        format!("no plugin registered for {}@{}", parsed.plugin_id, parsed.plugin_version),
                    ),
                    stub_metadata(),
                )
            }
        };

        let handler_ref = match self
            .registry
            .resolve_route(&parsed.plugin_id, &resolved_plugin.resolved_version, &parsed.method, &parsed.path)
            .await
        {
            Some(handler_ref) => handler_ref,
            None => {
                return failure(
                    PluginError::new(
                        ErrorCode::HandlerNotFound,
                        format!("{} has no route for {} {}", parsed.plugin_id, parsed.method, parsed.path),
                    ),
                    stub_metadata(),
                )
            }
        };

        let span_id = new_id(IdKind::Span);
        let descriptor = PluginContextDescriptor {
            host_type: caller.host_type,
            plugin_id: parsed.plugin_id.clone(),
            plugin_version: resolved_plugin.resolved_version.clone(),
            request_id: caller.request_id.clone(),
            trace_id: caller.trace_id.clone(),
            span_id: span_id.clone(),
            invocation_id: new_id(IdKind::Invocation),
            execution_id: new_id(IdKind::Execution),
            handler_id: format!("{}#{}", handler_ref.file, handler_ref.export),
            command_id: None,
            tenant_id: caller.tenant_id.clone(),
            permissions: resolved_plugin.permissions.clone(),
            host_context: caller.host_context.clone(),
        };

        let route = target_ref.route_string();
        let request = ExecutionRequest {
            execution_id: descriptor.execution_id.clone(),
            descriptor,
            plugin_root: resolved_plugin.plugin_root.clone(),
            handler_ref,
            input,
            workspace: resolved_plugin.workspace.clone(),
            timeout_ms,
            target: Some(WireInvokeTarget {
                namespace,
                plugin_id: parsed.plugin_id.clone(),
                plugin_version: resolved_plugin.resolved_version.clone(),
                route: route.clone(),
            }),
            export_name: None,
            invoke_chain: Some(chain),
        };

        let result = self.facade.execute(request, signal).await;
        drop(fan_out_guard);

        let status = if result.is_ok() { "ok" } else { "error" };
        let error = match &result {
            ExecutionResult::Failure { error, .. } => Some(error.code.as_str().to_string()),
            ExecutionResult::Success { .. } => None,
        };
        let duration_ms = result.execution_time_ms() as i64;
        self.trace_recorder
            .record_span(
                &caller.trace_id,
                TraceSpan {
                    id: span_id,
                    parent_span_id: Some(caller.span_id.clone()),
                    plugin_id: parsed.plugin_id,
                    plugin_version: resolved_plugin.resolved_version,
                    route,
                    method: parsed.method,
                    path: parsed.path,
                    start_time_ms: now_ms,
                    end_time_ms: now_ms + duration_ms,
                    duration_ms,
                    status,
                    error,
                },
            )
            .await;

        result
    }

    fn acquire_fan_out(&self, parent_key: &str) -> Result<FanOutGuard, ChainDenyReason> {
        let counter = self
            .fan_out
            .entry(parent_key.to_string())
            .or_insert_with(|| Arc::new(AtomicUsize::new(0)))
            .clone();

        let mut current = counter.load(Ordering::SeqCst);
        loop {
            if current >= self.limits.max_fan_out {
                return Err(ChainDenyReason::FanOutExceeded);
            }
            match counter.compare_exchange(current, current + 1, Ordering::SeqCst, Ordering::SeqCst) {
                Ok(_) => return Ok(FanOutGuard { counter }),
                Err(observed) => current = observed,
            }
        }
    }
}

fn chain_error(reason: ChainDenyReason) -> PluginError {
    match reason {
        ChainDenyReason::DepthExceeded => {
            PluginError::new(ErrorCode::ChainDepthExceeded, "invoke chain max depth exceeded")
        }
        ChainDenyReason::FanOutExceeded => {
            PluginError::new(ErrorCode::ChainFanOutExceeded, "invoke chain max fan-out exceeded")
        }
        ChainDenyReason::TimeExceeded => {
            PluginError::new(ErrorCode::ChainTimeExceeded, "invoke chain time budget exhausted")
        }
        ChainDenyReason::CycleDetected => {
            PluginError::new(ErrorCode::CycleDetected, "invoke target already present in call chain")
        }
    }
}

fn stub_metadata() -> ExecutionMetadata {
    ExecutionMetadata {
        backend: "invoke-broker".into(),
        workspace_id: String::new(),
        execution_meta: Value::Null,
        target: None,
    }
}

fn failure(error: PluginError, metadata: ExecutionMetadata) -> ExecutionResult {
    ExecutionResult::Failure {
        error,
        execution_time_ms: 0,
        metadata,
    }
}
