//! Per-invocation request context: the correlation identifiers C3 binds onto
//! every log line and span for a single plugin execution.

use serde_json::{Map, Value};
use tracing::Span;

/// Log/span field keys the runtime reserves for itself. Plugin-supplied
/// structured log fields that collide with one of these are dropped before
/// merging, per spec §4.3's "prefix-protected writer so plugin code cannot
/// overwrite system-reserved log keys".
pub const RESERVED_KEYS: &[&str] = &[
    "reqId",
    "traceId",
    "spanId",
    "invocationId",
    "pluginId",
    "handlerId",
];

/// Strip any key in `user` that collides with [`RESERVED_KEYS`], returning
/// the sanitized map.
#[must_use]
pub fn sanitize_user_fields(user: Map<String, Value>) -> Map<String, Value> {
    user.into_iter()
        .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
        .collect()
}

/// Correlation identifiers for one plugin execution, bound as child fields
/// on every span/log line emitted while it runs.
#[derive(Debug, Clone)]
pub struct RequestContext {
    component: String,
    operation: Option<String>,
    req_id: Option<String>,
    trace_id: Option<String>,
    span_id: Option<String>,
    invocation_id: Option<String>,
    plugin_id: Option<String>,
    handler_id: Option<String>,
}

impl RequestContext {
    /// Start a context for `component` (the crate/module name emitting
    /// these spans, e.g. `"kb-worker-pool"`).
    #[must_use]
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            operation: None,
            req_id: None,
            trace_id: None,
            span_id: None,
            invocation_id: None,
            plugin_id: None,
            handler_id: None,
        }
    }

    /// Name the operation this context covers (e.g. `"execute"`).
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Bind the request id.
    #[must_use]
    pub fn with_request_id(mut self, req_id: impl Into<String>) -> Self {
        self.req_id = Some(req_id.into());
        self
    }

    /// Bind the trace id.
    #[must_use]
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Bind the span id.
    #[must_use]
    pub fn with_span_id(mut self, span_id: impl Into<String>) -> Self {
        self.span_id = Some(span_id.into());
        self
    }

    /// Bind the invocation id.
    #[must_use]
    pub fn with_invocation_id(mut self, invocation_id: impl Into<String>) -> Self {
        self.invocation_id = Some(invocation_id.into());
        self
    }

    /// Bind the plugin id.
    #[must_use]
    pub fn with_plugin_id(mut self, plugin_id: impl Into<String>) -> Self {
        self.plugin_id = Some(plugin_id.into());
        self
    }

    /// Bind the handler id.
    #[must_use]
    pub fn with_handler_id(mut self, handler_id: impl Into<String>) -> Self {
        self.handler_id = Some(handler_id.into());
        self
    }

    /// Build the tracing span carrying every bound correlation field.
    ///
    /// Enter it with `.entered()` or store a [`RequestGuard`] from
    /// [`RequestContext::enter`] to keep it live across an `await`.
    #[must_use]
    pub fn span(&self) -> Span {
        tracing::info_span!(
            "kb.execution",
            component = %self.component,
            operation = self.operation.as_deref().unwrap_or(""),
            reqId = self.req_id.as_deref().unwrap_or(""),
            traceId = self.trace_id.as_deref().unwrap_or(""),
            spanId = self.span_id.as_deref().unwrap_or(""),
            invocationId = self.invocation_id.as_deref().unwrap_or(""),
            pluginId = self.plugin_id.as_deref().unwrap_or(""),
            handlerId = self.handler_id.as_deref().unwrap_or(""),
        )
    }

    /// Enter the span and hold it for the lifetime of the returned guard.
    #[must_use]
    pub fn enter(&self) -> RequestGuard {
        RequestGuard {
            _entered: self.span().entered(),
        }
    }
}

/// An entered [`RequestContext`] span; dropping it exits the span.
pub struct RequestGuard {
    _entered: tracing::span::EnteredSpan,
}
