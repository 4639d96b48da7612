//! The platform event bus plugin code and internal components (C9's state
//! transitions, C11's connection lifecycle) publish onto, per spec §4.9
//! ("Each transition publishes an event on the platform event bus") and
//! the plugin-facing `context.api.events` surface described in §3.
//!
//! Grounded on the teacher's `astrid-events::bus::EventBus` (broadcast
//! channel + subscriber count), trimmed to the single `broadcast::Sender`
//! this workspace needs — the teacher's synchronous subscriber registry has
//! no counterpart here, since every consumer in this workspace is async.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;

/// Default channel capacity; matches the teacher's default.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// An event published onto the platform bus.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformEvent {
    /// Dotted event type, e.g. `"degradation.transition"`, `"ws.connect"`.
    pub event_type: String,
    /// Arbitrary structured payload.
    pub payload: Value,
}

impl PlatformEvent {
    /// Build an event with the given type and payload.
    #[must_use]
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }
}

/// Broadcasts [`PlatformEvent`]s to any number of subscribers.
///
/// Cloning an [`EventBus`] shares the same underlying channel — every clone
/// publishes onto and subscribes from the same stream, which is how a single
/// bus instance is handed out to C9, C11, and the platform adapter alike.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<PlatformEvent>>,
}

impl EventBus {
    /// Build a bus with the default channel capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Build a bus with an explicit channel capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish `event`, returning the number of live subscribers that
    /// received it. A return of `0` is not an error — nobody was listening.
    pub fn publish(&self, event: PlatformEvent) -> usize {
        let event = Arc::new(event);
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribe to the event stream.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<PlatformEvent>> {
        self.sender.subscribe()
    }

    /// Current number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let delivered = bus.publish(PlatformEvent::new("degradation.transition", serde_json::json!({"to": "degraded"})));
        assert_eq!(delivered, 1);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, "degradation.transition");
    }

    #[test]
    fn publish_with_no_subscribers_returns_zero() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(PlatformEvent::new("ws.connect", Value::Null)), 0);
    }

    #[test]
    fn clone_shares_the_same_channel() {
        let bus = EventBus::new();
        let clone = bus.clone();
        let _rx = bus.subscribe();
        assert_eq!(clone.subscriber_count(), 1);
    }
}
