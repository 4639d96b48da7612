//! Typed configuration sections for the worker pool, degradation controller,
//! and sandbox hardening posture.

use serde::{Deserialize, Serialize};

/// Warm-up strategy for a newly started worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WarmupMode {
    /// No pre-warming; workers spawn on first demand.
    None,
    /// Pre-warm handlers for the top-N most frequently invoked routes.
    TopN,
    /// Pre-warm only handlers explicitly marked for warm-up in their manifest.
    Marked,
}

impl Default for WarmupMode {
    fn default() -> Self {
        WarmupMode::None
    }
}

/// C7 worker pool configuration, defaults per spec §4.7.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerPoolConfig {
    /// Minimum number of warm workers to keep alive.
    pub min: usize,
    /// Maximum number of workers the pool may spawn.
    pub max: usize,
    /// Requests a worker serves before it is recycled.
    pub max_requests_per_worker: u64,
    /// Milliseconds of uptime before a worker is recycled.
    pub max_uptime_ms_per_worker: u64,
    /// Bound on the FIFO acceptance queue.
    pub max_queue_size: usize,
    /// Milliseconds a queued request waits before `AcquireTimeout`.
    pub acquire_timeout_ms: u64,
    /// Per-plugin concurrency cap; `None` means unlimited.
    pub max_concurrent_per_plugin: Option<usize>,
    /// Milliseconds between periodic worker health checks.
    pub health_check_interval_ms: u64,
    /// Warm-up strategy applied at pool construction.
    pub warmup_mode: WarmupMode,
    /// Number of routes to pre-warm when `warmup_mode` is `TopN`.
    pub top_n: usize,
    /// Maximum distinct handlers the pool will keep warm simultaneously.
    pub max_handlers: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            min: 2,
            max: 10,
            max_requests_per_worker: 1000,
            max_uptime_ms_per_worker: 30 * 60 * 1000,
            max_queue_size: 100,
            acquire_timeout_ms: 5000,
            max_concurrent_per_plugin: None,
            health_check_interval_ms: 10_000,
            warmup_mode: WarmupMode::None,
            top_n: 5,
            max_handlers: 20,
        }
    }
}

/// C9 degradation controller thresholds and timings, defaults per spec §4.9.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DegradationConfig {
    /// Milliseconds between resource samples.
    pub sample_interval_ms: u64,
    /// CPU percent thresholds entering `{degraded, critical}`.
    pub cpu_thresholds: [f64; 2],
    /// Memory percent thresholds entering `{degraded, critical}`.
    pub memory_thresholds: [f64; 2],
    /// Queue-depth thresholds entering `{degraded, critical}`.
    pub queue_thresholds: [u64; 2],
    /// Hysteresis (lower) thresholds for returning toward `normal`:
    /// `[cpu, memory, queue]`.
    pub recovery_thresholds: [f64; 3],
    /// Milliseconds a target state must be stably indicated before the
    /// controller actually transitions.
    pub debounce_ms: u64,
    /// Advisory delay (ms) added to the accept path while `degraded`.
    pub degraded_delay_ms: u64,
    /// Advisory delay (ms) added to the accept path while `critical`.
    pub critical_delay_ms: u64,
    /// If set, new submissions are rejected outright while `critical`.
    pub reject_on_critical: bool,
}

impl Default for DegradationConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 10_000,
            cpu_thresholds: [70.0, 90.0],
            memory_thresholds: [75.0, 90.0],
            queue_thresholds: [100, 500],
            recovery_thresholds: [50.0, 60.0, 50.0],
            debounce_ms: 30_000,
            degraded_delay_ms: 1000,
            critical_delay_ms: 5000,
            reject_on_critical: false,
        }
    }
}

/// Sandbox hardening posture, from `KB_SANDBOX_MODE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SandboxMode {
    /// Forbidden primitives are blocked at require/import time.
    Enforce,
    /// Forbidden primitives are allowed but emit a warning.
    Warn,
    /// Forbidden primitives are silently allowed (legacy compatibility).
    Compat,
}

impl Default for SandboxMode {
    fn default() -> Self {
        SandboxMode::Enforce
    }
}

impl std::str::FromStr for SandboxMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "enforce" => Ok(SandboxMode::Enforce),
            "warn" => Ok(SandboxMode::Warn),
            "compat" => Ok(SandboxMode::Compat),
            _ => Err(()),
        }
    }
}

/// Environment variables observed directly by the core, per spec §6.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeEnvConfig {
    /// `KB_LOG_LEVEL` / `DEBUG`.
    pub log_level: Option<String>,
    /// `KB_SANDBOX_MODE`.
    pub sandbox_mode: SandboxMode,
    /// `KB_SANDBOX_TRACE`.
    pub sandbox_trace: bool,
    /// `KB_WORKFLOW_SERVICE_URL`.
    pub workflow_service_url: Option<String>,
    /// `KB_RAW_CONFIG_JSON`, forwarded verbatim to subprocess bootstraps.
    pub raw_config_json: Option<String>,
}

/// The full runtime configuration: worker pool, degradation controller, and
/// environment-observed settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    /// Worker pool configuration.
    #[serde(default)]
    pub worker_pool: WorkerPoolConfig,
    /// Degradation controller configuration.
    #[serde(default)]
    pub degradation: DegradationConfig,
    /// Environment-observed settings.
    #[serde(default)]
    pub env: RuntimeEnvConfig,
}
