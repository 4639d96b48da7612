//! C11: the WebSocket connection registry.
//!
//! Tracks active connections per channel for targeted and broadcast
//! delivery, per spec §4 table and §5. See [`registry::ConnectionRegistry`].

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod message;
pub mod registry;

pub use message::WsMessage;
pub use registry::{ConnectionRegistry, DeliveryError};
