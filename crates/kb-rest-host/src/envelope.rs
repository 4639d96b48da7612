//! REST response envelope and HTTP status derivation, per spec §6/§7:
//! success is `{status:"ok", data, meta}` with HTTP 200/201; failure is
//! `{status:"error", http, code, message, details?, meta}` with the status
//! `ErrorCode::http_status` classifies it as.

use kb_core::ExecutionResult;
use serde::Serialize;
use serde_json::Value;

const API_VERSION: &str = "v1";

/// Metadata attached to every REST envelope.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestMeta {
    /// The originating request's id.
    pub request_id: String,
    /// Wall-clock execution duration, milliseconds.
    pub duration_ms: u64,
    /// The envelope shape's API version.
    pub api_version: &'static str,
}

/// The REST response envelope, per spec §6.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestEnvelope {
    /// `"ok"` or `"error"`.
    pub status: &'static str,
    /// The handler's return value, present only on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// The HTTP status this envelope was rendered at, present only on
    /// failure (success's status is carried by the response itself).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http: Option<u16>,
    /// The stable error code, present only on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    /// Human-readable message, present only on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Structured error details, present only on failure and non-null.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// Request id, duration, and API version.
    pub meta: RestMeta,
}

/// Render an [`ExecutionResult`] into its REST envelope and matching HTTP
/// status. `is_post` selects 201 over 200 for a successful POST, per §6.
#[must_use]
pub fn render(request_id: &str, result: &ExecutionResult, is_post: bool) -> (u16, RestEnvelope) {
    let meta = RestMeta {
        request_id: request_id.to_string(),
        duration_ms: result.execution_time_ms(),
        api_version: API_VERSION,
    };
    match result {
        ExecutionResult::Success { data, .. } => {
            let http = if is_post { 201 } else { 200 };
            (
                http,
                RestEnvelope {
                    status: "ok",
                    data: Some(data.clone()),
                    http: None,
                    code: None,
                    message: None,
                    details: None,
                    meta,
                },
            )
        }
        ExecutionResult::Failure { error, .. } => {
            let http = error.code.http_status();
            let details = (!error.details.is_null()).then(|| error.details.clone());
            (
                http,
                RestEnvelope {
                    status: "error",
                    data: None,
                    http: Some(http),
                    code: Some(error.code.as_str()),
                    message: Some(error.message.clone()),
                    details,
                    meta,
                },
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kb_core::error::{ErrorCode, PluginError};
    use kb_core::ExecutionMetadata;

    fn metadata() -> ExecutionMetadata {
        ExecutionMetadata {
            backend: "in-process".into(),
            workspace_id: "ws-1".into(),
            execution_meta: Value::Null,
            target: None,
        }
    }

    #[test]
    fn successful_get_renders_200() {
        let result = ExecutionResult::Success {
            data: serde_json::json!({"n": 1}),
            execution_time_ms: 5,
            metadata: metadata(),
        };
        let (http, envelope) = render("req-1", &result, false);
        assert_eq!(http, 200);
        assert_eq!(envelope.status, "ok");
        assert_eq!(envelope.data.unwrap()["n"], 1);
    }

    #[test]
    fn successful_post_renders_201() {
        let result = ExecutionResult::Success {
            data: Value::Null,
            execution_time_ms: 5,
            metadata: metadata(),
        };
        let (http, _envelope) = render("req-1", &result, true);
        assert_eq!(http, 201);
    }

    #[test]
    fn permission_denied_renders_403_with_details() {
        let result = ExecutionResult::Failure {
            error: PluginError::permission_denied("fs.read denied", "/t/.env"),
            execution_time_ms: 1,
            metadata: metadata(),
        };
        let (http, envelope) = render("req-1", &result, false);
        assert_eq!(http, 403);
        assert_eq!(envelope.status, "error");
        assert_eq!(envelope.code, Some(ErrorCode::PermissionDenied.as_str()));
        assert_eq!(envelope.details.unwrap()["path"], "/t/.env");
        assert_eq!(envelope.http, Some(403));
    }

    #[test]
    fn queue_full_renders_429() {
        let result = ExecutionResult::Failure {
            error: PluginError::new(ErrorCode::QueueFull, "queue is full"),
            execution_time_ms: 1,
            metadata: metadata(),
        };
        let (http, _envelope) = render("req-1", &result, false);
        assert_eq!(http, 429);
    }
}
