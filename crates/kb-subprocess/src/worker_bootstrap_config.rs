//! The payload handed to a persistent pool worker at spawn time.
//!
//! Unlike [`crate::BootstrapRequest`] (one execution's complete resolution
//! data), a pool worker serves many, possibly unrelated, executions over its
//! lifetime — each `execute` frame carries its own full request. All the
//! worker needs up front is the shared secret it checks every `execute`
//! frame's `authToken` against, per spec §4.6 step 3.

use serde::{Deserialize, Serialize};

/// Spawn-time configuration for a `kb-bootstrap --persistent` worker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerBootstrapConfig {
    /// Per-worker token every `execute` frame on this channel must echo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let config = WorkerBootstrapConfig {
            auth_token: Some("tok-1".into()),
        };
        let json = serde_json::to_vec(&config).unwrap();
        let back: WorkerBootstrapConfig = serde_json::from_slice(&json).unwrap();
        assert_eq!(back.auth_token.as_deref(), Some("tok-1"));
    }

    #[test]
    fn omits_auth_token_field_when_absent() {
        let json = serde_json::to_value(WorkerBootstrapConfig::default()).unwrap();
        assert!(json.get("authToken").is_none());
    }
}
