//! Domain event system — decoupled observation of the responder.
//!
//! Events are published when something interesting happens (a reply fires,
//! a cooldown ticks down). Subscribers such as log sinks or tests react
//! without coupling to the router.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A message event was accepted for a channel
    MessageReceived {
        channel: String,
        window_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// A reply was withheld because the channel is cooling down
    ReplySuppressed {
        channel: String,
        remaining_secs: u64,
        timestamp: DateTime<Utc>,
    },

    /// A generated reply was posted to a channel
    ReplyEmitted {
        channel: String,
        reply_len: usize,
        context_messages: usize,
        timestamp: DateTime<Utc>,
    },

    /// A cooldown countdown ticked
    CooldownTick {
        channel: String,
        generation: u64,
        remaining_secs: u64,
    },

    /// A cooldown countdown ran to zero
    CooldownReady { channel: String, generation: u64 },

    /// A cooldown countdown was stopped before reaching zero
    CooldownCancelled { channel: String, generation: u64 },

    /// An error occurred
    ErrorOccurred {
        context: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
/// Components can subscribe to receive all events and filter for what they care about.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // Ignore send errors (no subscribers = that's fine)
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::CooldownTick {
            channel: "C1".into(),
            generation: 1,
            remaining_secs: 42,
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::CooldownTick {
                channel,
                remaining_secs,
                ..
            } => {
                assert_eq!(channel, "C1");
                assert_eq!(*remaining_secs, 42);
            }
            _ => panic!("Expected CooldownTick event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        // Publishing with no subscribers should not panic
        bus.publish(DomainEvent::ErrorOccurred {
            context: "test".into(),
            error_message: "no subscribers".into(),
            timestamp: Utc::now(),
        });
    }
}
