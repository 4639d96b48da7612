//! Layered configuration loading.
//!
//! 1. Start from [`RuntimeConfig::default`].
//! 2. Merge an optional TOML file at a caller-supplied path.
//! 3. Overlay `RuntimeEnvConfig` read directly from the process environment
//!    (env always wins — it is how an operator overrides a checked-in file
//!    without editing it).
//! 4. Validate.

use std::path::Path;

use tracing::{debug, info};

use crate::env::read_runtime_env;
use crate::error::{ConfigError, ConfigResult};
use crate::types::RuntimeConfig;
use crate::validate::validate;

/// Load the runtime configuration, optionally merging `path` (a TOML file)
/// over the defaults before the environment overlay is applied.
pub fn load(path: Option<&Path>) -> ConfigResult<RuntimeConfig> {
    let mut config = RuntimeConfig::default();

    if let Some(path) = path {
        if path.exists() {
            let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
                path: path.display().to_string(),
                source,
            })?;
            config = toml::from_str(&contents).map_err(|source| ConfigError::ParseError {
                path: path.display().to_string(),
                source,
            })?;
            info!(path = %path.display(), "loaded runtime config file");
        } else {
            debug!(path = %path.display(), "runtime config file not found, using defaults");
        }
    }

    config.env = read_runtime_env();
    validate(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = load(Some(Path::new("/nonexistent/kb-config.toml"))).unwrap();
        assert_eq!(config.worker_pool.min, 2);
    }

    #[test]
    fn no_path_uses_defaults() {
        let config = load(None).unwrap();
        assert_eq!(config.worker_pool, RuntimeConfig::default().worker_pool);
        assert_eq!(config.degradation, RuntimeConfig::default().degradation);
    }

    #[test]
    fn file_overrides_worker_pool_settings() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[worker_pool]\nmin = 4\nmax = 8").unwrap();
        let config = load(Some(file.path())).unwrap();
        assert_eq!(config.worker_pool.min, 4);
        assert_eq!(config.worker_pool.max, 8);
    }

    #[test]
    fn invalid_file_contents_surface_as_validation_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[worker_pool]\nmin = 20\nmax = 5").unwrap();
        assert!(load(Some(file.path())).is_err());
    }
}
