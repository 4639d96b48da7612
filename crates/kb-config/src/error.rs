//! Configuration error types.

use thiserror::Error;

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path of the file that could not be read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A config file could not be parsed as TOML.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path of the file that failed to parse.
        path: String,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },

    /// A loaded value failed validation.
    #[error("invalid configuration: {0}")]
    ValidationError(String),

    /// An environment variable held a value of the wrong shape.
    #[error("invalid value for {var}: {value}")]
    InvalidEnvValue {
        /// The environment variable name.
        var: String,
        /// The offending raw value.
        value: String,
    },
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
