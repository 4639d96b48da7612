//! The normalized error taxonomy every subsystem folds its failures into.
//!
//! Per spec §7, consumers on both sides of the IPC boundary dispatch on the
//! stable `code` string, never on Rust's own type — the original subtype is
//! necessarily lost once an error has crossed a process boundary, so
//! [`ErrorCode`] *is* the contract.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The stable, wire-round-trippable error code every [`PluginError`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ErrorCode {
    /// C1/C2 denied an access; deterministic, never retried.
    PermissionDenied,
    /// A manifest-declared handler could not be resolved.
    HandlerNotFound,
    /// The referenced plugin id/version could not be resolved.
    PluginNotFound,
    /// A cross-plugin invoke target string failed to parse or resolve.
    TargetInvalid,
    /// Input or output failed schema validation.
    ValidationError,
    /// Acquire, execution, or RPC timed out.
    TimeoutError,
    /// Execution was cancelled by an external signal.
    AbortError,
    /// C7's bounded queue was full.
    QueueFull,
    /// C7's queue wait exceeded the acquire timeout.
    AcquireTimeout,
    /// A subprocess worker died unexpectedly.
    WorkerCrashed,
    /// C8 detected a cross-plugin invoke cycle.
    CycleDetected,
    /// C8's chain depth budget was exceeded.
    ChainDepthExceeded,
    /// C8's chain fan-out budget was exceeded.
    ChainFanOutExceeded,
    /// C8's chain wall-clock time budget was exceeded.
    ChainTimeExceeded,
    /// The referenced target environment is not in an acceptable state.
    EnvironmentNotAvailable,
    /// The workspace lease could not be obtained or is not in an acceptable state.
    WorkspaceNotAvailable,
    /// Workspace lease acquisition or release failed.
    WorkspaceError,
    /// A platform adapter call failed; `details.service` names the adapter.
    PlatformError,
    /// Last-resort wrap for an error with no more specific code.
    InternalError,
}

impl ErrorCode {
    /// The wire string for this code, exactly as it appears in `details`/JSON.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::PermissionDenied => "PermissionDenied",
            ErrorCode::HandlerNotFound => "HandlerNotFound",
            ErrorCode::PluginNotFound => "PluginNotFound",
            ErrorCode::TargetInvalid => "TargetInvalid",
            ErrorCode::ValidationError => "ValidationError",
            ErrorCode::TimeoutError => "TimeoutError",
            ErrorCode::AbortError => "AbortError",
            ErrorCode::QueueFull => "QueueFull",
            ErrorCode::AcquireTimeout => "AcquireTimeout",
            ErrorCode::WorkerCrashed => "WorkerCrashed",
            ErrorCode::CycleDetected => "CycleDetected",
            ErrorCode::ChainDepthExceeded => "ChainDepthExceeded",
            ErrorCode::ChainFanOutExceeded => "ChainFanOutExceeded",
            ErrorCode::ChainTimeExceeded => "ChainTimeExceeded",
            ErrorCode::EnvironmentNotAvailable => "EnvironmentNotAvailable",
            ErrorCode::WorkspaceNotAvailable => "WorkspaceNotAvailable",
            ErrorCode::WorkspaceError => "WorkspaceError",
            ErrorCode::PlatformError => "PlatformError",
            ErrorCode::InternalError => "InternalError",
        }
    }

    /// The REST status code this kind of error maps to, per spec §7.
    #[must_use]
    pub fn http_status(self) -> u16 {
        match self {
            ErrorCode::PermissionDenied => 403,
            ErrorCode::ValidationError | ErrorCode::TargetInvalid => 400,
            ErrorCode::HandlerNotFound | ErrorCode::PluginNotFound => 404,
            ErrorCode::TimeoutError | ErrorCode::ChainTimeExceeded => 504,
            ErrorCode::AcquireTimeout => 408,
            ErrorCode::QueueFull => 429,
            ErrorCode::AbortError => 499,
            ErrorCode::WorkerCrashed
            | ErrorCode::CycleDetected
            | ErrorCode::ChainDepthExceeded
            | ErrorCode::ChainFanOutExceeded
            | ErrorCode::EnvironmentNotAvailable
            | ErrorCode::WorkspaceNotAvailable
            | ErrorCode::WorkspaceError
            | ErrorCode::PlatformError
            | ErrorCode::InternalError => 500,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized plugin execution error, IPC-serializable and reconstructible
/// on either side of a process boundary without losing the code consumers
/// need to dispatch on.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
#[serde(rename_all = "camelCase")]
pub struct PluginError {
    /// The stable dispatchable code.
    pub code: ErrorCode,
    /// Human-readable message, safe to surface to a CLI user or log line.
    pub message: String,
    /// Structured detail payload; shape depends on `code` (e.g. `path` for
    /// `PermissionDenied`, `visited`/`currentPlugin` for `CycleDetected`).
    #[serde(default)]
    pub details: Value,
    /// Advisory retry delay, set for `TimeoutError` and backpressure codes
    /// when the producing layer has a meaningful estimate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl PluginError {
    /// Build an error with no structured details.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: Value::Null,
            retry_after_ms: None,
        }
    }

    /// Attach structured details.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Attach an advisory retry delay.
    #[must_use]
    pub fn with_retry_after_ms(mut self, ms: u64) -> Self {
        self.retry_after_ms = Some(ms);
        self
    }

    /// Build a `PermissionDenied` error for a specific resource path/target.
    #[must_use]
    pub fn permission_denied(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(ErrorCode::PermissionDenied, message).with_details(serde_json::json!({
            "path": path.into(),
        }))
    }

    /// Wrap an arbitrary error as a last-resort `InternalError`.
    ///
    /// Mirrors spec §7's `wrapError(e, code?)` helper: anything that reaches
    /// the runner boundary without already being a [`PluginError`] is folded
    /// in here rather than allowed to propagate as a raw panic or string.
    #[must_use]
    pub fn wrap(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_round_trips_through_json_as_stable_string() {
        let json = serde_json::to_string(&ErrorCode::PermissionDenied).unwrap();
        assert_eq!(json, "\"PermissionDenied\"");
        let back: ErrorCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ErrorCode::PermissionDenied);
    }

    #[test]
    fn http_status_matches_spec_table() {
        assert_eq!(ErrorCode::PermissionDenied.http_status(), 403);
        assert_eq!(ErrorCode::ValidationError.http_status(), 400);
        assert_eq!(ErrorCode::TargetInvalid.http_status(), 400);
        assert_eq!(ErrorCode::HandlerNotFound.http_status(), 404);
        assert_eq!(ErrorCode::TimeoutError.http_status(), 504);
        assert_eq!(ErrorCode::AcquireTimeout.http_status(), 408);
        assert_eq!(ErrorCode::QueueFull.http_status(), 429);
        assert_eq!(ErrorCode::InternalError.http_status(), 500);
    }

    #[test]
    fn permission_denied_carries_path_detail() {
        let err = PluginError::permission_denied("fs.read denied", "/t/.env");
        assert_eq!(err.details["path"], "/t/.env");
        assert_eq!(err.code, ErrorCode::PermissionDenied);
    }

    #[test]
    fn serializes_with_camel_case_retry_after() {
        let err = PluginError::new(ErrorCode::TimeoutError, "timed out").with_retry_after_ms(500);
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["retryAfterMs"], 500);
    }
}
