//! The newline-delimited JSON wire protocol spoken between parent and child
//! over the IPC socket, per spec §4.4/§6.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One frame of the IPC protocol. Tagged on `type`, matching spec §6's
/// message type list exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Frame {
    /// Parent → child: invoke `execute(context, input)` on the loaded handler.
    #[serde(rename = "execute")]
    Execute {
        /// Correlates this call with its `result`/`error` response.
        #[serde(rename = "requestId")]
        request_id: String,
        /// The execution request payload.
        request: Value,
        /// Per-execution token minted when the socket was bound. Threaded
        /// through per spec §4.6 step 3 ("optional auth token"); the parent
        /// does not yet reject a mismatched or missing token (spec §9's
        /// open question — tracked, not silently invented).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        #[serde(rename = "authToken")]
        auth_token: Option<String>,
    },
    /// Child → parent: the handler returned successfully.
    #[serde(rename = "result")]
    Result {
        /// Correlates this response with its originating `execute`.
        #[serde(rename = "requestId")]
        request_id: String,
        /// The handler's return value.
        data: Value,
    },
    /// Child → parent, or parent → child for an `adapter:call`: an error
    /// occurred processing the correlated request.
    #[serde(rename = "error")]
    Error {
        /// Correlates this response with its originating request.
        #[serde(rename = "requestId")]
        request_id: String,
        /// The normalized error.
        error: kb_core::error::PluginError,
    },
    /// Parent → child: a liveness probe; expects `healthOk` in response.
    #[serde(rename = "health")]
    Health {
        /// Correlates this probe with its `healthOk` response.
        #[serde(rename = "requestId")]
        request_id: String,
    },
    /// Child → parent: liveness probe acknowledgment.
    #[serde(rename = "healthOk")]
    HealthOk {
        /// Correlates this response with its originating `health` probe.
        #[serde(rename = "requestId")]
        request_id: String,
    },
    /// Parent → child: begin graceful shutdown.
    #[serde(rename = "shutdown")]
    Shutdown {
        /// If true, finish any in-flight request before exiting.
        graceful: bool,
    },
    /// Child → parent: the worker has finished bootstrapping and is ready
    /// to accept `execute` frames.
    #[serde(rename = "ready")]
    Ready,
    /// Parent → child: cancel the in-flight execution (soft-abort before a
    /// SIGKILL escalation).
    #[serde(rename = "abort")]
    Abort {
        /// Correlates this abort with the `execute` it targets.
        #[serde(rename = "requestId")]
        request_id: String,
    },
    /// Either direction: a governed platform-adapter RPC.
    #[serde(rename = "adapter:call")]
    AdapterCall {
        /// Correlates this call with its `adapter:response`.
        #[serde(rename = "requestId")]
        request_id: String,
        /// Adapter name to dispatch to (e.g. `"platform"`, `"fs"`).
        adapter: String,
        /// Method name on that adapter.
        method: String,
        /// Positional arguments.
        args: Vec<Value>,
        /// Per-call timeout override, milliseconds.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
    /// Response to an `adapter:call`.
    #[serde(rename = "adapter:response")]
    AdapterResponse {
        /// Correlates this response with its originating `adapter:call`.
        #[serde(rename = "requestId")]
        request_id: String,
        /// The adapter method's return value, on success.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        /// The normalized error, on failure.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<kb_core::error::PluginError>,
    },
}

impl Frame {
    /// The `requestId` this frame correlates to, if it carries one
    /// (`shutdown` and `ready` are unary and carry none).
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Frame::Execute { request_id, .. }
            | Frame::Result { request_id, .. }
            | Frame::Error { request_id, .. }
            | Frame::Health { request_id }
            | Frame::HealthOk { request_id }
            | Frame::Abort { request_id }
            | Frame::AdapterCall { request_id, .. }
            | Frame::AdapterResponse { request_id, .. } => Some(request_id),
            Frame::Shutdown { .. } | Frame::Ready => None,
        }
    }

    /// Serialize as one NDJSON line, including the trailing `\n`.
    #[must_use]
    pub fn to_line(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        line.push('\n');
        line
    }

    /// Parse one line (without its trailing newline) as a [`Frame`].
    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_execute_frame() {
        let frame = Frame::Execute {
            request_id: "req-1".into(),
            request: serde_json::json!({"input": {"a": 1}}),
            auth_token: Some("tok-1".into()),
        };
        let line = frame.to_line();
        assert!(line.ends_with('\n'));
        let back = Frame::from_line(&line).unwrap();
        assert_eq!(back.request_id(), Some("req-1"));
    }

    #[test]
    fn adapter_call_tag_matches_wire_name() {
        let frame = Frame::AdapterCall {
            request_id: "req-2".into(),
            adapter: "platform".into(),
            method: "enqueueWorkflow".into(),
            args: vec![],
            timeout: None,
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "adapter:call");
    }

    #[test]
    fn ready_and_shutdown_carry_no_request_id() {
        assert_eq!(Frame::Ready.request_id(), None);
        assert_eq!(Frame::Shutdown { graceful: true }.request_id(), None);
    }
}
