//! C3: the context factory.
//!
//! Assembles the per-invocation [`PluginContext`] value from a descriptor,
//! a platform adapter, and a workspace lease, wiring C1/C2 into every facade
//! it hands to the handler and giving the API module a place to register
//! cleanup hooks the runner guarantees will run.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod cleanup;
pub mod context;
pub mod factory;

pub use cleanup::CleanupStack;
pub use context::{PluginContext, TraceIdentity};
pub use factory::{build, ContextBuild, ContextInputs};
