//! C11: tracks active WebSocket connections per channel for targeted and
//! broadcast delivery, per spec §4 table and §5's concurrency invariant:
//! inserts/removals happen only on WS lifecycle callbacks (single-owner
//! discipline), and broadcast iterates a snapshot so a connection closing
//! mid-broadcast cannot invalidate the loop.
//!
//! Grounded on `astrid-kernel/src/socket.rs`'s per-connection task plus
//! `EventBus::subscribe` fan-out shape, generalized from "every connection
//! sees every event" to channel-scoped targeted/broadcast delivery backed
//! by `dashmap` instead of a single broadcast channel, since deliveries here
//! need to reach one connection id, not every subscriber.

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;

use crate::message::WsMessage;

/// Error returned when a delivery target no longer exists.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// No connection is registered under this channel.
    #[error("channel {0:?} has no registered connections")]
    ChannelNotFound(String),
    /// The channel exists but this connection id is not registered on it.
    #[error("connection {1:?} is not registered on channel {0:?}")]
    ConnectionNotFound(String, String),
    /// The connection's outbound queue is closed (the send task has exited).
    #[error("connection {1:?} on channel {0:?} is no longer accepting messages")]
    ConnectionClosed(String, String),
}

type Outbound = mpsc::UnboundedSender<WsMessage>;

/// Per-channel, per-connection registry of outbound message senders.
///
/// Cloning shares the same underlying maps — every host adapter holding a
/// clone sees the same live connection set.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    channels: DashMap<String, DashMap<String, Outbound>>,
}

impl ConnectionRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly connected WS client, returning the receiver half
    /// the host adapter's write loop should drain.
    ///
    /// Called from the WS `connect` lifecycle callback only, per the
    /// single-owner discipline.
    pub fn register(&self, channel: &str, connection_id: &str) -> mpsc::UnboundedReceiver<WsMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.channels
            .entry(channel.to_string())
            .or_default()
            .insert(connection_id.to_string(), tx);
        debug!(channel, connection_id, "ws connection registered");
        rx
    }

    /// Remove a connection, e.g. on the WS `disconnect`/`error` callback.
    ///
    /// A no-op if the channel or connection is already gone — disconnects
    /// can race with a broadcast that already dropped a closed sender.
    pub fn unregister(&self, channel: &str, connection_id: &str) {
        if let Some(connections) = self.channels.get(channel) {
            connections.remove(connection_id);
            let is_empty = connections.is_empty();
            drop(connections);
            if is_empty {
                self.channels.remove(channel);
            }
        }
        debug!(channel, connection_id, "ws connection unregistered");
    }

    /// Number of live connections on `channel`.
    #[must_use]
    pub fn connection_count(&self, channel: &str) -> usize {
        self.channels.get(channel).map(|c| c.len()).unwrap_or(0)
    }

    /// Total number of channels with at least one live connection.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Deliver `message` to exactly one connection.
    pub fn send_to(
        &self,
        channel: &str,
        connection_id: &str,
        message: WsMessage,
    ) -> Result<(), DeliveryError> {
        let connections = self
            .channels
            .get(channel)
            .ok_or_else(|| DeliveryError::ChannelNotFound(channel.to_string()))?;
        let sender = connections
            .get(connection_id)
            .ok_or_else(|| DeliveryError::ConnectionNotFound(channel.to_string(), connection_id.to_string()))?;
        sender
            .send(message)
            .map_err(|_| DeliveryError::ConnectionClosed(channel.to_string(), connection_id.to_string()))
    }

    /// Deliver `message` to every connection on `channel`.
    ///
    /// Takes a snapshot of the current senders before sending so a
    /// connection that disconnects mid-broadcast (removing itself from the
    /// map) cannot invalidate this loop's iteration. Returns the number of
    /// connections the message was successfully queued to; a connection
    /// whose send fails (queue closed) is silently skipped, as it is about
    /// to be unregistered by its own lifecycle callback anyway.
    pub fn broadcast(&self, channel: &str, message: WsMessage) -> usize {
        let Some(connections) = self.channels.get(channel) else {
            return 0;
        };
        let snapshot: Vec<Outbound> = connections.iter().map(|entry| entry.value().clone()).collect();
        drop(connections);

        snapshot
            .into_iter()
            .filter(|sender| sender.send(message.clone()).is_ok())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_send_to_delivers_on_the_receiver() {
        let registry = ConnectionRegistry::new();
        let mut rx = registry.register("room-1", "conn-a");
        let message = WsMessage::new("message", None, 0);
        registry.send_to("room-1", "conn-a", message.clone()).unwrap();
        assert_eq!(rx.try_recv().unwrap(), message);
    }

    #[test]
    fn send_to_unknown_channel_errors() {
        let registry = ConnectionRegistry::new();
        let err = registry
            .send_to("nope", "conn-a", WsMessage::new("message", None, 0))
            .unwrap_err();
        assert_eq!(err, DeliveryError::ChannelNotFound("nope".to_string()));
    }

    #[test]
    fn send_to_unknown_connection_on_known_channel_errors() {
        let registry = ConnectionRegistry::new();
        let _rx = registry.register("room-1", "conn-a");
        let err = registry
            .send_to("room-1", "conn-b", WsMessage::new("message", None, 0))
            .unwrap_err();
        assert_eq!(
            err,
            DeliveryError::ConnectionNotFound("room-1".to_string(), "conn-b".to_string())
        );
    }

    #[test]
    fn broadcast_reaches_every_connection_on_the_channel_only() {
        let registry = ConnectionRegistry::new();
        let mut rx_a = registry.register("room-1", "conn-a");
        let mut rx_b = registry.register("room-1", "conn-b");
        let mut rx_other = registry.register("room-2", "conn-c");

        let delivered = registry.broadcast("room-1", WsMessage::new("message", None, 0));

        assert_eq!(delivered, 2);
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
        assert!(rx_other.try_recv().is_err());
    }

    #[test]
    fn unregister_removes_the_connection_and_empties_the_channel() {
        let registry = ConnectionRegistry::new();
        let _rx = registry.register("room-1", "conn-a");
        assert_eq!(registry.connection_count("room-1"), 1);

        registry.unregister("room-1", "conn-a");

        assert_eq!(registry.connection_count("room-1"), 0);
        assert_eq!(registry.channel_count(), 0);
    }

    #[test]
    fn broadcast_skips_a_connection_whose_receiver_was_dropped() {
        let registry = ConnectionRegistry::new();
        let rx_a = registry.register("room-1", "conn-a");
        drop(rx_a);
        let mut rx_b = registry.register("room-1", "conn-b");

        let delivered = registry.broadcast("room-1", WsMessage::new("message", None, 0));

        assert_eq!(delivered, 1);
        assert!(rx_b.try_recv().is_ok());
    }
}
