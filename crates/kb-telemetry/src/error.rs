//! Telemetry error types.

use thiserror::Error;

/// Errors that can occur while configuring or initializing telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The log level or directive string could not be parsed.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// The global subscriber was already installed.
    #[error("initialization error: {0}")]
    InitError(String),
}

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
