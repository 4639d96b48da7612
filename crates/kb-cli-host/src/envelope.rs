//! JSON-mode result envelope and process exit code, per spec §6/§7:
//! `{status: "ok"|"error", data?, error?, meta:{requestId, durationMs,
//! apiVersion}}`; exit `0` success, `1` generic error, `2` configuration/
//! validation error, `124` timeout (advisory).

use kb_core::error::ErrorCode;
use kb_core::ExecutionResult;
use serde::Serialize;
use serde_json::Value;

const API_VERSION: &str = "v1";

/// Metadata attached to every CLI JSON-mode envelope.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CliMeta {
    /// The originating request's id.
    pub request_id: String,
    /// Wall-clock execution duration, milliseconds.
    pub duration_ms: u64,
    /// The envelope shape's API version.
    pub api_version: &'static str,
}

/// The CLI JSON-mode result envelope, per spec §6.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CliEnvelope {
    /// `"ok"` or `"error"`.
    pub status: &'static str,
    /// The handler's return value, present only on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// The normalized error, present only on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    /// Request id, duration, and API version.
    pub meta: CliMeta,
}

/// Render an [`ExecutionResult`] into the CLI's JSON-mode envelope.
#[must_use]
pub fn render(request_id: &str, result: &ExecutionResult) -> CliEnvelope {
    let meta = CliMeta {
        request_id: request_id.to_string(),
        duration_ms: result.execution_time_ms(),
        api_version: API_VERSION,
    };
    match result {
        ExecutionResult::Success { data, .. } => CliEnvelope {
            status: "ok",
            data: Some(data.clone()),
            error: None,
            meta,
        },
        ExecutionResult::Failure { error, .. } => CliEnvelope {
            status: "error",
            data: None,
            error: Some(serde_json::to_value(error).unwrap_or(Value::Null)),
            meta,
        },
    }
}

/// The process exit code for `result`, per spec §6's CLI surface table.
#[must_use]
pub fn exit_code(result: &ExecutionResult) -> i32 {
    match result {
        ExecutionResult::Success { .. } => 0,
        ExecutionResult::Failure { error, .. } => match error.code {
            ErrorCode::ValidationError | ErrorCode::TargetInvalid => 2,
            ErrorCode::TimeoutError | ErrorCode::ChainTimeExceeded | ErrorCode::AcquireTimeout => 124,
            _ => 1,
        },
    }
}
