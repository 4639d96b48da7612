//! ID generation for the identifiers that flow through every invocation.

use uuid::Uuid;

/// The kind of identifier being minted, used only to make call sites
/// self-documenting (`new_id(IdKind::Trace)` reads better than a bare
/// `new_id()`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    /// A request identifier (`requestId`).
    Request,
    /// A trace identifier (`traceId`), stable across an entire call chain.
    Trace,
    /// A span identifier (`spanId`), unique per hop in a call chain.
    Span,
    /// An invocation identifier (`invocationId`), unique per handler call.
    Invocation,
    /// An execution identifier (`executionId`), unique per façade call.
    Execution,
    /// A workspace identifier.
    Workspace,
}

/// Mint a fresh UUIDv4-based identifier.
///
/// All identifiers in this system share the same representation (a UUID
/// rendered as a hyphenated string) regardless of `kind` — the kind exists
/// purely for call-site clarity, not to change the format.
#[must_use]
pub fn new_id(_kind: IdKind) -> String {
    Uuid::new_v4().to_string()
}

/// Resolve a `requestId`: reuse the caller-provided value if present and
/// non-empty, otherwise mint a fresh one.
///
/// Per spec.md §4.3 and the Open Question in §9 ("some context factories
/// create `requestId` as `${traceId}:${spanId}` and others reuse the
/// descriptor value; the spec chose the latter").
#[must_use]
pub fn resolve_request_id(provided: Option<&str>) -> String {
    match provided {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => new_id(IdKind::Request),
    }
}

/// Resolve a `traceId`: first non-empty of descriptor-carried,
/// host-context-carried, else the `requestId` itself (per spec.md §4.3).
#[must_use]
pub fn resolve_trace_id(
    descriptor_trace: Option<&str>,
    host_context_trace: Option<&str>,
    request_id: &str,
) -> String {
    for candidate in [descriptor_trace, host_context_trace] {
        if let Some(id) = candidate {
            if !id.is_empty() {
                return id.to_string();
            }
        }
    }
    request_id.to_string()
}

/// Resolve a `spanId`: descriptor-carried if present, else a fresh id.
#[must_use]
pub fn resolve_span_id(descriptor_span: Option<&str>) -> String {
    match descriptor_span {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => new_id(IdKind::Span),
    }
}
