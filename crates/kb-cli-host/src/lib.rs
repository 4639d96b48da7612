//! CLI front-end: a named-interface submission contract onto C10, per
//! spec §1/§6. This crate owns no route/command table — flag parsing and
//! subcommand dispatch belong to the actual CLI binary, out of scope here
//! (§1's "their only contract here is the `ExecutionRequest` they submit").
//! What it does own is the two things the core specifies for this front-end:
//! the `submit` entrypoint and the JSON-mode result envelope/exit code rules.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod envelope;
mod host;

pub use envelope::{exit_code, render, CliEnvelope, CliMeta};
pub use host::CliHost;
