//! Trace spans recorded for every invoke hop, per spec §4.8: "Record a trace
//! span `{id, parentSpanId, pluginId, pluginVersion, routeOrCommand, method,
//! path, startTime, endTime, duration, status, error?}`."
//!
//! Persistence (rotation, retention of the last N per root call) is a
//! platform storage concern outside this crate — [`TraceRecorder`] is the
//! seam a concrete deployment implements against `.kb/debug/tmp` or
//! wherever traces are kept, matching `kb-invoke::registry::PluginRegistry`'s
//! "define the seam, let the deployment wire the rest" shape.

use async_trait::async_trait;

/// One recorded hop in a cross-plugin call chain.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceSpan {
    /// This span's own id.
    pub id: String,
    /// The parent span id, `None` only for a chain's very first hop.
    pub parent_span_id: Option<String>,
    /// The plugin this hop invoked.
    pub plugin_id: String,
    /// The resolved version of that plugin.
    pub plugin_version: String,
    /// The `"METHOD /path"` route invoked.
    pub route: String,
    /// HTTP-style method token.
    pub method: String,
    /// Route path.
    pub path: String,
    /// Unix epoch milliseconds the hop started.
    pub start_time_ms: i64,
    /// Unix epoch milliseconds the hop ended.
    pub end_time_ms: i64,
    /// `end_time_ms - start_time_ms`.
    pub duration_ms: i64,
    /// `"ok"` or `"error"`.
    pub status: &'static str,
    /// The error code, when `status == "error"`.
    pub error: Option<String>,
}

impl TraceSpan {
    /// Duration in milliseconds, computed from the recorded start/end.
    #[must_use]
    pub fn compute_duration_ms(start_time_ms: i64, end_time_ms: i64) -> i64 {
        end_time_ms.saturating_sub(start_time_ms)
    }
}

/// Accepts completed spans for a root call's trace.
#[async_trait]
pub trait TraceRecorder: Send + Sync {
    /// Record one span under `trace_id`'s accumulated trace.
    async fn record_span(&self, trace_id: &str, span: TraceSpan);
}

/// Discards every span. The broker's default when no concrete recorder has
/// been wired in.
pub struct NoopTraceRecorder;

#[async_trait]
impl TraceRecorder for NoopTraceRecorder {
    async fn record_span(&self, _trace_id: &str, _span: TraceSpan) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_is_the_difference_between_start_and_end() {
        assert_eq!(TraceSpan::compute_duration_ms(1_000, 1_250), 250);
    }

    #[tokio::test]
    async fn noop_recorder_accepts_without_panicking() {
        let recorder = NoopTraceRecorder;
        recorder
            .record_span(
                "trace-1",
                TraceSpan {
                    id: "span-1".into(),
                    parent_span_id: None,
                    plugin_id: "kb-labs/search".into(),
                    plugin_version: "1.2.3".into(),
                    route: "GET /v1/query".into(),
                    method: "GET".into(),
                    path: "/v1/query".into(),
                    start_time_ms: 0,
                    end_time_ms: 5,
                    duration_ms: 5,
                    status: "ok",
                    error: None,
                },
            )
            .await;
    }
}
