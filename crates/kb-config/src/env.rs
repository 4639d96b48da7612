//! Reads the environment variables the core observes directly, per spec §6.

use std::str::FromStr;

use crate::types::{RuntimeEnvConfig, SandboxMode};

/// Read [`RuntimeEnvConfig`] from the process environment.
///
/// `KB_SANDBOX_MODE` values that don't parse fall back to
/// [`SandboxMode::Enforce`] rather than failing construction — an
/// unrecognized hardening posture should fail closed, not abort startup.
#[must_use]
pub fn read_runtime_env() -> RuntimeEnvConfig {
    let log_level = std::env::var("KB_LOG_LEVEL")
        .ok()
        .or_else(|| std::env::var("DEBUG").ok().map(|_| "debug".to_string()));

    let sandbox_mode = std::env::var("KB_SANDBOX_MODE")
        .ok()
        .and_then(|v| SandboxMode::from_str(&v).ok())
        .unwrap_or_default();

    let sandbox_trace = std::env::var("KB_SANDBOX_TRACE")
        .ok()
        .map(|v| v == "1")
        .unwrap_or(false);

    let workflow_service_url = std::env::var("KB_WORKFLOW_SERVICE_URL").ok();
    let raw_config_json = std::env::var("KB_RAW_CONFIG_JSON").ok();

    RuntimeEnvConfig {
        log_level,
        sandbox_mode,
        sandbox_trace,
        workflow_service_url,
        raw_config_json,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_sandbox_mode_defaults_to_enforce() {
        std::env::remove_var("KB_SANDBOX_MODE");
        let config = read_runtime_env();
        assert_eq!(config.sandbox_mode, SandboxMode::Enforce);
    }

    #[test]
    fn unrecognized_sandbox_mode_falls_back_to_enforce() {
        std::env::set_var("KB_SANDBOX_MODE", "not-a-real-mode");
        let config = read_runtime_env();
        assert_eq!(config.sandbox_mode, SandboxMode::Enforce);
        std::env::remove_var("KB_SANDBOX_MODE");
    }

    #[test]
    fn recognized_sandbox_mode_parses() {
        std::env::set_var("KB_SANDBOX_MODE", "warn");
        let config = read_runtime_env();
        assert_eq!(config.sandbox_mode, SandboxMode::Warn);
        std::env::remove_var("KB_SANDBOX_MODE");
    }
}
