//! The value a handler's `execute(context, input)` returns.

use serde_json::Value;

/// What a handler returned, per spec §4.5: `{exitCode?, data?, meta?}` or
/// nothing, which is equivalent to `{exitCode: 0}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandlerOutput {
    /// Process-style exit code; `0`/absent means success.
    pub exit_code: Option<i32>,
    /// The handler's return value.
    pub data: Option<Value>,
    /// User-supplied metadata, merged with (and overridable by) the standard
    /// fields [`crate::inject_standard_metadata`] adds.
    pub meta: Option<Value>,
}

impl HandlerOutput {
    /// The implicit `{exitCode: 0}` a handler returning nothing is
    /// equivalent to.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// True if this output represents success (no exit code, or `0`).
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.exit_code, None | Some(0))
    }
}
