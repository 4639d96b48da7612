//! WebSocket front-end: a named-interface submission contract onto C10,
//! plus the connection lifecycle and message envelope rules of spec §6/§9.
//! No socket accept loop or channel mounter lives here — per §1 this front
//! end's only contract is the `ExecutionRequest` it submits; what's owned
//! here is `submit`, the `{type, payload?, messageId?, timestamp}` message
//! shape (re-exported from [`kb_connection_registry`]), and the
//! `connect`/`message`/`disconnect`/`error` lifecycle helpers that bridge a
//! live connection to C11's [`ConnectionRegistry`].

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod envelope;
mod host;

pub use envelope::render_message;
pub use host::WsHost;
pub use kb_connection_registry::{ConnectionRegistry, WsMessage};
