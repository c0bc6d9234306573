//! Event Bus Service
//!
//! Pub/sub system broadcasting `DetectionEvent`s to subscribers (spec §6
//! "Events"). Implements the Observer pattern for loose coupling between
//! the engine and whatever UI/host is watching it.
//!
//! Reference: https://refactoring.guru/design-patterns/observer

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use crate::domain::events::DetectionEvent;

/// Channel capacity for event broadcasting.
const CHANNEL_CAPACITY: usize = 1024;

/// Event bus for publishing and subscribing to `DetectionEvent`s.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<DetectionEvent>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    pub fn publish(&self, event: DetectionEvent) {
        let event_type = event.event_type();
        let event = Arc::new(event);

        match self.sender.send(event) {
            Ok(count) => debug!("published {} event to {} subscribers", event_type, count),
            Err(_) => debug!("published {} event (no active subscribers)", event_type),
        }
    }

    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber { receiver: self.sender.subscribe() }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// A subscriber to `DetectionEvent`s.
pub struct EventSubscriber {
    receiver: broadcast::Receiver<Arc<DetectionEvent>>,
}

impl EventSubscriber {
    /// Receives the next event, waiting if necessary. Lag is logged and
    /// skipped rather than propagated as an error — a slow subscriber
    /// should see the newest events, not be stuck replaying a backlog.
    pub async fn recv(&mut self) -> Option<Arc<DetectionEvent>> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    tracing::warn!("event subscriber lagged by {} events", count);
                    continue;
                }
            }
        }
    }

    /// Tries to receive an event without waiting.
    pub fn try_recv(&mut self) -> Option<Arc<DetectionEvent>> {
        self.receiver.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::DetectorLoadedEvent;
    use chrono::Utc;

    fn loaded_event() -> DetectionEvent {
        DetectionEvent::DetectorLoaded(DetectorLoadedEvent {
            success: true,
            error: None,
            timestamp: Utc::now(),
        })
    }

    #[tokio::test]
    async fn publish_broadcasts_to_subscriber() {
        let bus = EventBus::new();
        let mut subscriber = bus.subscribe();

        bus.publish(loaded_event());

        let received = subscriber.recv().await;
        assert!(received.is_some());
        assert_eq!(received.unwrap().event_type(), "detector_loaded");
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_event() {
        let bus = EventBus::new();
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        bus.publish(loaded_event());

        assert!(sub1.recv().await.is_some());
        assert!(sub2.recv().await.is_some());
    }

    #[test]
    fn subscriber_count_tracks_active_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);

        let _sub1 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn try_recv_is_none_without_a_published_event() {
        let bus = EventBus::new();
        let mut subscriber = bus.subscribe();
        assert!(subscriber.try_recv().is_none());
    }
}
