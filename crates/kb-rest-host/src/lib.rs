//! REST front-end: a named-interface submission contract onto C10, per
//! spec §1/§6. No route table lives here — method/path mounting is the
//! actual HTTP server's job, out of scope for this core. What this crate
//! owns is the `submit` entrypoint and the envelope/status-code rules
//! every REST response must follow regardless of which router mounts it.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod envelope;
mod host;

pub use envelope::{render, RestEnvelope, RestMeta};
pub use host::RestHost;
