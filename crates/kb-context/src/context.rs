//! The in-process, live [`PluginContext`] value handed to a plugin handler.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use kb_core::descriptor::HostContext;
use kb_core::HostType;
use kb_platform::GovernedPlatform;
use kb_runtime_shim::RuntimeShim;

/// The trace identifiers carried by a context, bound onto every log line
/// and span emitted while the handler runs.
#[derive(Debug, Clone)]
pub struct TraceIdentity {
    /// Request id, stable for the originating request.
    pub request_id: String,
    /// Trace id, stable across an entire call chain.
    pub trace_id: String,
    /// Span id, unique to this hop.
    pub span_id: String,
    /// Invocation id, unique to this handler call.
    pub invocation_id: String,
    /// Execution id, unique to this façade call.
    pub execution_id: String,
}

/// The in-process, live value handed to a plugin handler.
///
/// Invariant (spec §3): every field is either a primitive copy of a
/// descriptor field, a facade wired to C1 ([`RuntimeShim`]), a platform
/// adapter ([`GovernedPlatform`]), or an API module. It does not hold
/// mutable global state — everything here is either `Copy`/owned data or an
/// `Arc` to a service scoped to this one execution.
pub struct PluginContext {
    /// Which front-end originated this execution.
    pub host: HostType,
    /// Trace/request identifiers.
    pub trace: TraceIdentity,
    /// The plugin being invoked.
    pub plugin_id: String,
    /// The resolved plugin version.
    pub plugin_version: String,
    /// The tenant this execution runs on behalf of, if multi-tenancy applies.
    pub tenant_id: Option<String>,
    /// The command id, when this execution originated from a CLI command.
    pub command_id: Option<String>,
    /// Working directory for this execution.
    pub cwd: PathBuf,
    /// Output directory for this execution (`${cwd}/.kb/output` by default).
    pub outdir: PathBuf,
    /// Cancellation signal; handlers and backends should observe it.
    pub signal: CancellationToken,
    /// Host-specific context (CLI argv, REST method/path, WS channel, …).
    pub host_context: HostContext,
    /// Sandboxed fs/fetch/env facade (C2), gated by C1.
    pub runtime: Arc<RuntimeShim>,
    /// Governed platform adapter (workflows/jobs/snapshot/execution).
    pub platform: Arc<GovernedPlatform>,
}
