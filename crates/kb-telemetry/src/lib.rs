//! Logging and per-invocation request context for the kb plugin execution
//! runtime.
//!
//! This crate provides:
//! - Configurable logging setup with multiple formats
//! - A request context for correlating log lines and spans across one
//!   plugin execution
//! - A reserved-key guard preventing plugin-supplied log fields from
//!   overwriting system-bound correlation fields
//!
//! # Example
//!
//! ```rust,no_run
//! use kb_telemetry::{LogConfig, LogFormat, setup_logging, RequestContext};
//!
//! # fn main() -> Result<(), kb_telemetry::TelemetryError> {
//! let config = LogConfig::new("debug")
//!     .with_format(LogFormat::Pretty)
//!     .with_directive("kb_worker_pool=trace");
//!
//! setup_logging(&config)?;
//!
//! let ctx = RequestContext::new("kb-exec").with_operation("execute");
//! let _guard = ctx.enter();
//! tracing::info!("executing plugin handler");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod prelude;

mod context;
mod error;
mod logging;

pub use context::{sanitize_user_fields, RequestContext, RequestGuard, RESERVED_KEYS};
pub use error::{TelemetryError, TelemetryResult};
pub use logging::{setup_default_logging, setup_logging, LogConfig, LogFormat, LogTarget};
