//! C4: newline-delimited JSON IPC over Unix-domain sockets between the
//! parent process and its subprocess workers.
//!
//! [`wire::Frame`] defines the protocol. [`server::IpcServer`] is the
//! parent-side listener; [`client::IpcClient`] is the child-side,
//! lazily-connecting, auto-reconnecting RPC client. Both sides end up
//! talking over the same [`channel::Channel`] abstraction, which also
//! dispatches `adapter:call` frames inline via [`channel::AdapterDispatch`].

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod channel;
pub mod client;
pub mod platform_bridge;
pub mod server;
pub mod wire;

pub use channel::{AdapterDispatch, Channel, ChannelSender};
pub use client::IpcClient;
pub use platform_bridge::IpcPlatformAdapter;
pub use server::IpcServer;
pub use wire::Frame;
