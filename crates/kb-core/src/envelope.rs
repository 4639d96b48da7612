//! The request/result envelope that crosses the C10 façade boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::descriptor::{HandlerRef, PluginContextDescriptor};
use crate::error::PluginError;

/// A cross-plugin invoke target, present on [`ExecutionRequest`] when the
/// caller is routing through C8 rather than invoking its own handler
/// directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeTarget {
    /// Namespace the target environment/workspace belongs to, required
    /// whenever a target is specified at all.
    pub namespace: String,
    /// The plugin id being targeted.
    pub plugin_id: String,
    /// The plugin version being targeted (`"latest"` resolves at call time).
    pub plugin_version: String,
    /// The route being targeted, `"METHOD /path"`.
    pub route: String,
}

/// Cross-plugin call-chain bookkeeping C8 attaches to a hand-off request,
/// per spec §4.8's chain limits: depth tracked as hop count from the root,
/// a `visited` list for cycle detection, and the root call's start time for
/// computing the remaining time budget at each hop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeChain {
    /// Hop count from the root call; the root call itself is depth 0.
    pub depth: u32,
    /// Plugin ids visited so far in this chain, root first, used to detect
    /// re-entry (`CycleDetected`).
    pub visited: Vec<String>,
    /// Unix epoch milliseconds the root call started, for computing the
    /// remaining `maxChainTime` budget at each hop.
    pub root_started_at_ms: i64,
}

/// A request submitted to C10, the execution façade.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    /// Unique id for this execution, minted by C3.
    pub execution_id: String,
    /// The assembled invocation descriptor.
    pub descriptor: PluginContextDescriptor,
    /// Absolute path to the plugin's root directory.
    pub plugin_root: String,
    /// The handler being invoked.
    pub handler_ref: HandlerRef,
    /// The handler's input payload.
    pub input: Value,
    /// The workspace identifier this execution runs against.
    pub workspace: String,
    /// Per-request timeout override; falls back to the backend default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Cross-plugin invoke target, present only for C8-routed calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<InvokeTarget>,
    /// Override for the exported function name, when it differs from
    /// [`HandlerRef::export`] (used by C8 when a route maps to a differently
    /// named export than the manifest's default handler).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_name: Option<String>,
    /// Cross-plugin call-chain state, present only on C8-routed hand-offs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoke_chain: Option<InvokeChain>,
}

/// Metadata attached to every [`ExecutionResult`], success or failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionMetadata {
    /// Which backend served the request: `"in-process"`, `"subprocess"`, or
    /// `"worker-pool"`.
    pub backend: String,
    /// The workspace the execution ran against.
    pub workspace_id: String,
    /// Backend-specific execution metadata (worker id, PID, recycle count, …).
    #[serde(default)]
    pub execution_meta: Value,
    /// The invoke target this execution served, when routed through C8.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<InvokeTarget>,
}

/// The outcome of a C10 execution: exactly one of a success payload or a
/// normalized [`PluginError`], per spec §3/§7.
///
/// Serializes to `{"ok": true, ...}` / `{"ok": false, ...}` with a genuine
/// JSON boolean tag — serde's built-in internally-tagged representation only
/// supports string tags, so the wire format is produced by hand below rather
/// than derived.
#[derive(Debug, Clone)]
pub enum ExecutionResult {
    /// The handler ran to completion and returned a value.
    Success {
        /// The handler's return value.
        data: Value,
        /// Wall-clock duration of the execution, in milliseconds.
        execution_time_ms: u64,
        /// Backend and routing metadata.
        metadata: ExecutionMetadata,
    },
    /// The handler failed, was denied, or the backend could not complete it.
    Failure {
        /// The normalized error.
        error: PluginError,
        /// Wall-clock duration up to the point of failure, in milliseconds.
        execution_time_ms: u64,
        /// Backend and routing metadata, best-effort (may be partially filled
        /// when the failure occurred before a backend was selected).
        metadata: ExecutionMetadata,
    },
}

impl Serialize for ExecutionResult {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        match self {
            ExecutionResult::Success {
                data,
                execution_time_ms,
                metadata,
            } => {
                let mut s = serializer.serialize_struct("ExecutionResult", 4)?;
                s.serialize_field("ok", &true)?;
                s.serialize_field("data", data)?;
                s.serialize_field("executionTimeMs", execution_time_ms)?;
                s.serialize_field("metadata", metadata)?;
                s.end()
            }
            ExecutionResult::Failure {
                error,
                execution_time_ms,
                metadata,
            } => {
                let mut s = serializer.serialize_struct("ExecutionResult", 4)?;
                s.serialize_field("ok", &false)?;
                s.serialize_field("error", error)?;
                s.serialize_field("executionTimeMs", execution_time_ms)?;
                s.serialize_field("metadata", metadata)?;
                s.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for ExecutionResult {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Raw {
            ok: bool,
            #[serde(default)]
            data: Value,
            #[serde(default)]
            error: Option<PluginError>,
            execution_time_ms: u64,
            metadata: ExecutionMetadata,
        }

        let raw = Raw::deserialize(deserializer)?;
        if raw.ok {
            Ok(ExecutionResult::Success {
                data: raw.data,
                execution_time_ms: raw.execution_time_ms,
                metadata: raw.metadata,
            })
        } else {
            let error = raw.error.ok_or_else(|| {
                serde::de::Error::missing_field("error")
            })?;
            Ok(ExecutionResult::Failure {
                error,
                execution_time_ms: raw.execution_time_ms,
                metadata: raw.metadata,
            })
        }
    }
}

impl ExecutionResult {
    /// True if this result represents success.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, ExecutionResult::Success { .. })
    }

    /// The execution duration regardless of outcome.
    #[must_use]
    pub fn execution_time_ms(&self) -> u64 {
        match self {
            ExecutionResult::Success {
                execution_time_ms, ..
            }
            | ExecutionResult::Failure {
                execution_time_ms, ..
            } => *execution_time_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn sample_metadata() -> ExecutionMetadata {
        ExecutionMetadata {
            backend: "in-process".into(),
            workspace_id: "ws-1".into(),
            execution_meta: Value::Null,
            target: None,
        }
    }

    #[test]
    fn success_serializes_ok_true() {
        let result = ExecutionResult::Success {
            data: serde_json::json!({"wrote": true}),
            execution_time_ms: 12,
            metadata: sample_metadata(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["ok"], true);
        assert_eq!(json["executionTimeMs"], 12);
    }

    #[test]
    fn failure_carries_normalized_error() {
        let result = ExecutionResult::Failure {
            error: PluginError::permission_denied("denied", "/t/.env"),
            execution_time_ms: 3,
            metadata: sample_metadata(),
        };
        assert!(!result.is_ok());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["error"]["code"], ErrorCode::PermissionDenied.as_str());
    }

    #[test]
    fn failure_round_trips_through_json() {
        let result = ExecutionResult::Failure {
            error: PluginError::permission_denied("denied", "/t/.env"),
            execution_time_ms: 3,
            metadata: sample_metadata(),
        };
        let json = serde_json::to_string(&result).unwrap();
        let back: ExecutionResult = serde_json::from_str(&json).unwrap();
        assert!(!back.is_ok());
        assert_eq!(back.execution_time_ms(), 3);
    }
}
