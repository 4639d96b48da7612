//! Commonly used telemetry types, for `use kb_telemetry::prelude::*;`.

pub use crate::{
    sanitize_user_fields, LogConfig, LogFormat, LogTarget, RequestContext, RequestGuard,
    TelemetryError, TelemetryResult, RESERVED_KEYS,
};
pub use crate::{setup_default_logging, setup_logging};
