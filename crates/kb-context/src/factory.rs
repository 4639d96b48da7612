//! C3: assembles a [`PluginContext`] from a descriptor, platform adapter,
//! and workspace lease.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use kb_core::descriptor::PluginContextDescriptor;
use kb_core::ids::{new_id, resolve_request_id, resolve_span_id, resolve_trace_id, IdKind};
use kb_platform::{GovernedPlatform, PlatformAdapter};
use kb_runtime_shim::RuntimeShim;

use crate::cleanup::CleanupStack;
use crate::context::{PluginContext, TraceIdentity};

/// Inputs C3 needs beyond the descriptor itself.
pub struct ContextInputs {
    /// The platform adapter to wrap in a governance proxy.
    pub platform_adapter: Arc<dyn PlatformAdapter>,
    /// Working directory for this execution.
    pub cwd: PathBuf,
    /// Output directory override; defaults to `${cwd}/.kb/output`.
    pub outdir: Option<PathBuf>,
    /// External cancellation signal, if the caller provided one.
    pub signal: Option<CancellationToken>,
    /// HTTP client shared across fetch calls for this execution.
    pub http: reqwest::Client,
}

/// The output of [`build`]: the live context plus its cleanup stack.
pub struct ContextBuild {
    /// The assembled context.
    pub context: PluginContext,
    /// The cleanup stack the API module may push release hooks onto.
    pub cleanup: CleanupStack,
}

/// Assemble a [`PluginContext`] from `descriptor` and `inputs`.
///
/// Identifier resolution follows spec §4.3 exactly:
/// - `requestId` = descriptor value if present and non-empty, else fresh.
/// - `traceId` = first non-empty of descriptor-carried, host-context-carried,
///   else `requestId`.
/// - `spanId` = descriptor-carried if present, else fresh.
#[must_use]
pub fn build(descriptor: &PluginContextDescriptor, inputs: ContextInputs) -> ContextBuild {
    let request_id = resolve_request_id(Some(&descriptor.request_id));
    let trace_id = resolve_trace_id(Some(&descriptor.trace_id), None, &request_id);
    let span_id = resolve_span_id(Some(&descriptor.span_id));
    let invocation_id = if descriptor.invocation_id.is_empty() {
        new_id(IdKind::Invocation)
    } else {
        descriptor.invocation_id.clone()
    };
    let execution_id = if descriptor.execution_id.is_empty() {
        new_id(IdKind::Execution)
    } else {
        descriptor.execution_id.clone()
    };

    let outdir = inputs
        .outdir
        .unwrap_or_else(|| inputs.cwd.join(".kb").join("output"));

    let runtime = Arc::new(RuntimeShim::new(
        descriptor.permissions.clone(),
        inputs.cwd.clone(),
        outdir.clone(),
        inputs.http,
    ));
    let platform = Arc::new(GovernedPlatform::new(
        inputs.platform_adapter,
        descriptor.permissions.platform.clone(),
    ));

    let context = PluginContext {
        host: descriptor.host_type,
        trace: TraceIdentity {
            request_id,
            trace_id,
            span_id,
            invocation_id,
            execution_id,
        },
        plugin_id: descriptor.plugin_id.clone(),
        plugin_version: descriptor.plugin_version.clone(),
        tenant_id: descriptor.tenant_id.clone(),
        command_id: descriptor.command_id.clone(),
        cwd: inputs.cwd,
        outdir,
        signal: inputs.signal.unwrap_or_default(),
        host_context: descriptor.host_context.clone(),
        runtime,
        platform,
    };

    ContextBuild {
        context,
        cleanup: CleanupStack::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kb_core::descriptor::HostContext;
    use kb_core::PermissionSpec;
    use kb_platform::NoopPlatformAdapter;
    use std::collections::HashMap;

    fn descriptor() -> PluginContextDescriptor {
        PluginContextDescriptor {
            host_type: kb_core::HostType::Cli,
            plugin_id: "demo".into(),
            plugin_version: "1.0.0".into(),
            request_id: String::new(),
            trace_id: String::new(),
            span_id: String::new(),
            invocation_id: String::new(),
            execution_id: String::new(),
            handler_id: "handlers/main.ts#run".into(),
            command_id: None,
            tenant_id: None,
            permissions: PermissionSpec::default(),
            host_context: HostContext::Cli {
                argv: vec![],
                flags: HashMap::new(),
            },
        }
    }

    fn inputs(cwd: PathBuf) -> ContextInputs {
        ContextInputs {
            platform_adapter: Arc::new(NoopPlatformAdapter),
            cwd,
            outdir: None,
            signal: None,
            http: reqwest::Client::new(),
        }
    }

    #[test]
    fn mints_fresh_ids_when_descriptor_is_empty() {
        let build = build(&descriptor(), inputs(PathBuf::from("/t")));
        assert!(!build.context.trace.request_id.is_empty());
        assert_eq!(build.context.trace.trace_id, build.context.trace.request_id);
        assert!(!build.context.trace.span_id.is_empty());
    }

    #[test]
    fn reuses_descriptor_carried_ids() {
        let mut descriptor = descriptor();
        descriptor.request_id = "req-1".into();
        descriptor.trace_id = "trace-1".into();
        descriptor.span_id = "span-1".into();
        let build = build(&descriptor, inputs(PathBuf::from("/t")));
        assert_eq!(build.context.trace.request_id, "req-1");
        assert_eq!(build.context.trace.trace_id, "trace-1");
        assert_eq!(build.context.trace.span_id, "span-1");
    }

    #[test]
    fn outdir_defaults_under_cwd_dot_kb_output() {
        let build = build(&descriptor(), inputs(PathBuf::from("/t")));
        assert_eq!(build.context.outdir, PathBuf::from("/t/.kb/output"));
    }

    #[test]
    fn cleanup_stack_starts_empty() {
        let build = build(&descriptor(), inputs(PathBuf::from("/t")));
        assert!(build.cleanup.is_empty());
    }
}
