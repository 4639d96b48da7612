//! Renders an [`ExecutionResult`] into the WS wire message shape, per spec
//! §6/§9: success becomes a `"message"`-typed envelope carrying the
//! handler's return value as `payload`; failure becomes an `"error"`-typed
//! envelope carrying the stable error code and message in `payload`.

use kb_connection_registry::WsMessage;
use kb_core::ExecutionResult;

/// Build the outbound [`WsMessage`] for `result`, correlated to
/// `message_id` and timestamped `now_millis`.
///
/// `now_millis` is threaded in by the caller rather than read here, matching
/// [`WsMessage::new`]'s own clock-free design.
#[must_use]
pub fn render_message(message_id: &str, result: &ExecutionResult, now_millis: i64) -> WsMessage {
    let (message_type, payload) = match result {
        ExecutionResult::Success { data, .. } => ("message", data.clone()),
        ExecutionResult::Failure { error, .. } => (
            "error",
            serde_json::json!({
                "code": error.code.as_str(),
                "message": error.message,
                "details": error.details,
            }),
        ),
    };
    WsMessage::new(message_type, Some(payload), now_millis).with_message_id(message_id)
}
