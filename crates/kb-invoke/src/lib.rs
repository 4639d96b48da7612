//! C8: the cross-plugin invoke broker.
//!
//! Gates invocations initiated from within a handler against the caller's
//! `invoke` permissions, tracks chain depth/fan-out/time-budget limits and
//! cycle detection, resolves the target through a pluggable registry, and
//! hands off to the execution façade (C10), per spec §4.8. See
//! [`broker::InvokeBroker`] for the entry point.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod broker;
pub mod chain;
pub mod header;
pub mod registry;
pub mod target;
pub mod trace;

pub use broker::InvokeBroker;
pub use chain::{advance_chain, ChainDenyReason, InvokeLimits};
pub use header::{merge_trace_headers, TRACE_HEADER_WHITELIST};
pub use registry::{EmptyPluginRegistry, PluginRegistry, ResolvedPlugin};
pub use target::{parse_target, ParsedTarget, TargetParseError};
pub use trace::{NoopTraceRecorder, TraceRecorder, TraceSpan};
