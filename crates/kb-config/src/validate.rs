//! Structural validation for a loaded [`RuntimeConfig`].

use crate::error::ConfigError;
use crate::types::RuntimeConfig;

/// Validate `config`, returning the first violation found.
pub fn validate(config: &RuntimeConfig) -> Result<(), ConfigError> {
    let pool = &config.worker_pool;
    if pool.min > pool.max {
        return Err(ConfigError::ValidationError(format!(
            "worker_pool.min ({}) must not exceed worker_pool.max ({})",
            pool.min, pool.max
        )));
    }
    if pool.max_queue_size == 0 {
        return Err(ConfigError::ValidationError(
            "worker_pool.max_queue_size must be at least 1".into(),
        ));
    }
    if pool.top_n > pool.max_handlers {
        return Err(ConfigError::ValidationError(format!(
            "worker_pool.top_n ({}) must not exceed worker_pool.max_handlers ({})",
            pool.top_n, pool.max_handlers
        )));
    }

    let deg = &config.degradation;
    if deg.cpu_thresholds[0] >= deg.cpu_thresholds[1] {
        return Err(ConfigError::ValidationError(
            "degradation.cpu_thresholds must be strictly increasing [degraded, critical]".into(),
        ));
    }
    if deg.memory_thresholds[0] >= deg.memory_thresholds[1] {
        return Err(ConfigError::ValidationError(
            "degradation.memory_thresholds must be strictly increasing [degraded, critical]"
                .into(),
        ));
    }
    if deg.queue_thresholds[0] >= deg.queue_thresholds[1] {
        return Err(ConfigError::ValidationError(
            "degradation.queue_thresholds must be strictly increasing [degraded, critical]"
                .into(),
        ));
    }

    Ok(())
}
