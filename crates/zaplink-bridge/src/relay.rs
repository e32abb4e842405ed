//! # Event Relay
//!
//! Fans session events out to every connected realtime subscriber.
//!
//! Built on a `tokio::sync::broadcast` channel: the session manager emits,
//! each gateway subscriber holds a receiver. There is no buffering
//! guarantee; a subscriber that lags past the channel capacity drops the
//! oldest events (and the gateway logs it). Events emitted while nobody is
//! subscribed are simply discarded.

use tokio::sync::broadcast;
use tracing::debug;

use zaplink_core::{ConnectionStatus, ConnectionUpdate, RelayEvent};

/// Broadcast capacity. Plenty for a live-status mirror; subscribers that
/// fall this far behind are receiving a lag error, not stale state.
const RELAY_CAPACITY: usize = 256;

/// Fan-out hub for realtime events.
#[derive(Clone)]
pub struct EventRelay {
    tx: broadcast::Sender<RelayEvent>,
}

impl EventRelay {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(RELAY_CAPACITY);
        EventRelay { tx }
    }

    /// Subscribes a new realtime consumer. Only events emitted after this
    /// call are delivered; state replay for late joiners is the gateway's
    /// job.
    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.tx.subscribe()
    }

    /// Emits an event to all current subscribers.
    pub fn emit(&self, event: RelayEvent) {
        debug!(event = event.name(), "Relaying event");
        // An Err here only means nobody is subscribed right now
        let _ = self.tx.send(event);
    }

    /// Emits a `connectionUpdate` event.
    pub fn emit_status(&self, status: ConnectionStatus) {
        self.emit(RelayEvent::ConnectionUpdate(ConnectionUpdate { status }));
    }

    /// Emits a `qr` event.
    pub fn emit_qr(&self, code: impl Into<String>) {
        self.emit(RelayEvent::Qr(code.into()));
    }

    /// Emits a `newMessage` event.
    pub fn emit_message(&self, message: serde_json::Value) {
        self.emit(RelayEvent::NewMessage(message));
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventRelay {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_subscriber_receives_events_in_order() {
        let relay = EventRelay::new();
        let mut rx = relay.subscribe();

        relay.emit_status(ConnectionStatus::Connecting);
        relay.emit_qr("2@AbC");
        relay.emit_message(json!({"body": "hi"}));

        assert_eq!(
            rx.recv().await.unwrap(),
            RelayEvent::ConnectionUpdate(ConnectionUpdate {
                status: ConnectionStatus::Connecting
            })
        );
        assert_eq!(rx.recv().await.unwrap(), RelayEvent::Qr("2@AbC".into()));
        assert_eq!(
            rx.recv().await.unwrap(),
            RelayEvent::NewMessage(json!({"body": "hi"}))
        );
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_is_fine() {
        let relay = EventRelay::new();
        assert_eq!(relay.subscriber_count(), 0);
        relay.emit_status(ConnectionStatus::Open); // must not panic
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_events() {
        let relay = EventRelay::new();
        relay.emit_qr("old-code");

        let mut rx = relay.subscribe();
        relay.emit_qr("new-code");

        assert_eq!(rx.recv().await.unwrap(), RelayEvent::Qr("new-code".into()));
    }
}
