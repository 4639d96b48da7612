//! The WebSocket wire message shape, per spec §3/§9:
//! `{type, payload?, messageId?, timestamp}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message sent to or received from a WS connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WsMessage {
    /// The lifecycle/application message type, e.g. `"message"`, `"error"`.
    #[serde(rename = "type")]
    pub message_type: String,
    /// Arbitrary structured payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Client- or server-assigned correlation id.
    #[serde(rename = "messageId", skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Unix epoch milliseconds this message was produced.
    pub timestamp: i64,
}

impl WsMessage {
    /// Build a message of `message_type` with `payload`, timestamped `now`.
    ///
    /// `now` is taken as a parameter rather than read internally so this
    /// type stays free of a direct clock dependency, matching how
    /// `kb-context` threads timestamps in from its caller.
    #[must_use]
    pub fn new(message_type: impl Into<String>, payload: Option<Value>, now_millis: i64) -> Self {
        Self {
            message_type: message_type.into(),
            payload,
            message_id: None,
            timestamp: now_millis,
        }
    }

    /// Attach a correlation id.
    #[must_use]
    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }
}
