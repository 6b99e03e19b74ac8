//! Host-side event bus.
//!
//! Each module has a private outbound channel (see [`crate::module::Module`]).
//! The app drains those channels and republishes every event here, tagged
//! with the module that emitted it, so any number of host components can
//! subscribe.

use cooker_module_sdk::Event;
use tokio::sync::broadcast;

/// Default channel capacity for the event bus.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// An event together with the module that emitted it.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleEvent {
    pub source: String,
    pub event: Event,
}

/// Broadcast bus of [`ModuleEvent`]s.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ModuleEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// The capacity determines how many events are buffered for slow subscribers.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Publish an event. Returns `true` if there was at least one subscriber.
    pub fn publish(&self, source: impl Into<String>, event: Event) -> bool {
        self.tx
            .send(ModuleEvent {
                source: source.into(),
                event,
            })
            .is_ok()
    }

    pub fn subscribe(&self) -> EventBusReceiver {
        EventBusReceiver {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver for all events published on an [`EventBus`].
pub struct EventBusReceiver {
    rx: broadcast::Receiver<ModuleEvent>,
}

impl EventBusReceiver {
    /// Receive the next event.
    ///
    /// Returns `None` once the bus is closed. Events missed by a lagging
    /// receiver are skipped.
    pub async fn recv(&mut self) -> Option<ModuleEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!("Event subscriber lagged, {} event(s) dropped", missed);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Try to receive an event without blocking.
    pub fn try_recv(&mut self) -> Option<ModuleEvent> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        assert!(!bus.publish("auth", Event::named("ready")));
    }

    #[tokio::test]
    async fn test_subscribe_receives_tagged_event() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        assert!(bus.publish("storage", Event::named("saved")));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.source, "storage");
        assert_eq!(received.event.event, "saved");
    }

    #[test]
    fn test_try_recv_empty() {
        let bus = EventBus::with_capacity(4);
        let mut rx = bus.subscribe();
        assert!(rx.try_recv().is_none());
    }
}
