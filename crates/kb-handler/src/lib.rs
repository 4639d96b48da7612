//! C5: handler resolution and the in-process runner.
//!
//! A handler is registered ahead of time under its `{file, export}` pair
//! (per spec §9's "Cyclic plugin imports" note: there is no dynamic
//! `require`/`import` in this implementation — the handler set is
//! enumerated from manifests and wired into a [`HandlerRegistry`] at
//! startup, the same way the teacher's capsule engines are chosen by
//! manifest rather than resolved by a dynamic loader).
//!
//! [`run`] is the shared invocation path used both by the in-process
//! backend and, inside a subprocess/worker, by the bootstrap that loaded
//! exactly one handler for its whole lifetime.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod backend;
mod metadata;
mod output;
mod registry;
mod runner;

pub use backend::InProcessBackend;
pub use metadata::inject_standard_metadata;
pub use output::HandlerOutput;
pub use registry::{Handler, HandlerRegistry};
pub use runner::run;
