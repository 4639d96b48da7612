//! Logging setup for the kb runtime's host processes and subprocess workers.

use tracing_subscriber::EnvFilter;

use crate::error::{TelemetryError, TelemetryResult};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, human-readable output — the default for local development.
    Pretty,
    /// Single-line, human-readable output.
    Compact,
    /// Newline-delimited JSON, for production log aggregation.
    Json,
}

/// Where log output is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    /// Standard error (the default — stdout is reserved for handler/host
    /// protocol frames on both the daemon and subprocess worker paths).
    Stderr,
    /// Standard output.
    Stdout,
}

/// Builder for the global tracing subscriber.
///
/// Mirrors `KB_LOG_LEVEL`/`DEBUG` from spec §6: [`LogConfig::from_env`] reads
/// both, preferring `KB_LOG_LEVEL` when both are set.
#[derive(Debug, Clone)]
pub struct LogConfig {
    level: String,
    format: LogFormat,
    target: LogTarget,
    directives: Vec<String>,
}

impl LogConfig {
    /// Start a config at the given base level (`"info"`, `"debug"`, …).
    #[must_use]
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            format: LogFormat::Pretty,
            target: LogTarget::Stderr,
            directives: Vec::new(),
        }
    }

    /// Build a config from `KB_LOG_LEVEL`/`DEBUG` environment variables,
    /// defaulting to `"info"` when neither is set.
    #[must_use]
    pub fn from_env() -> Self {
        let level = std::env::var("KB_LOG_LEVEL")
            .ok()
            .or_else(|| std::env::var("DEBUG").ok().map(|_| "debug".to_string()))
            .unwrap_or_else(|| "info".to_string());
        Self::new(level)
    }

    /// Set the output format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the output target.
    #[must_use]
    pub fn with_target(mut self, target: LogTarget) -> Self {
        self.target = target;
        self
    }

    /// Add a per-module filter directive (e.g. `"kb_worker_pool=trace"`).
    #[must_use]
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    fn env_filter(&self) -> TelemetryResult<EnvFilter> {
        let mut filter = EnvFilter::try_new(&self.level)
            .map_err(|e| TelemetryError::ConfigError(e.to_string()))?;
        for directive in &self.directives {
            let directive = directive
                .parse()
                .map_err(|e: tracing_subscriber::filter::ParseError| {
                    TelemetryError::ConfigError(e.to_string())
                })?;
            filter = filter.add_directive(directive);
        }
        Ok(filter)
    }
}

/// Install the global tracing subscriber from `config`.
///
/// Returns [`TelemetryError::InitError`] if a global subscriber is already
/// installed — this can only happen once per process.
pub fn setup_logging(config: &LogConfig) -> TelemetryResult<()> {
    let filter = config.env_filter()?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = match (config.format, config.target) {
        (LogFormat::Json, LogTarget::Stderr) => builder.json().with_writer(std::io::stderr).try_init(),
        (LogFormat::Json, LogTarget::Stdout) => builder.json().with_writer(std::io::stdout).try_init(),
        (LogFormat::Compact, LogTarget::Stderr) => {
            builder.compact().with_writer(std::io::stderr).try_init()
        }
        (LogFormat::Compact, LogTarget::Stdout) => {
            builder.compact().with_writer(std::io::stdout).try_init()
        }
        (LogFormat::Pretty, LogTarget::Stderr) => builder.with_writer(std::io::stderr).try_init(),
        (LogFormat::Pretty, LogTarget::Stdout) => builder.with_writer(std::io::stdout).try_init(),
    };

    result.map_err(|e| TelemetryError::InitError(e.to_string()))
}

/// Install logging with the defaults appropriate for local development:
/// pretty format, stderr target, level from environment.
pub fn setup_default_logging() -> TelemetryResult<()> {
    setup_logging(&LogConfig::from_env())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_chains_without_panicking() {
        let config = LogConfig::new("debug")
            .with_format(LogFormat::Json)
            .with_directive("kb_worker_pool=trace");
        assert_eq!(config.level, "debug");
        assert_eq!(config.directives, vec!["kb_worker_pool=trace".to_string()]);
    }

    #[test]
    fn invalid_level_is_a_config_error() {
        let config = LogConfig::new("not-a-real-level!!");
        assert!(config.env_filter().is_err());
    }
}
