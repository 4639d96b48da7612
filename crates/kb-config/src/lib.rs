//! Layered configuration for the kb plugin execution runtime.
//!
//! Covers the worker pool (C7) and degradation controller (C9) tunables,
//! plus the sandbox/workflow environment variables the core observes
//! directly (spec §6): `KB_LOG_LEVEL`, `KB_SANDBOX_MODE`,
//! `KB_SANDBOX_TRACE`, `KB_WORKFLOW_SERVICE_URL`, `KB_RAW_CONFIG_JSON`.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod env;
mod error;
mod loader;
mod types;
mod validate;

pub use env::read_runtime_env;
pub use error::{ConfigError, ConfigResult};
pub use loader::load;
pub use types::{
    DegradationConfig, RuntimeConfig, RuntimeEnvConfig, SandboxMode, WarmupMode, WorkerPoolConfig,
};
pub use validate::validate;
