//! Event bus routing helpers.

use crate::payloads::{DEFAULT_CHANNEL_CAPACITY, Event, EventEnvelope, EventId};
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast::{self, Sender};
use tokio_stream::wrappers::BroadcastStream;

/// Stream wrapper used by subscribers.
pub type EventStream = BroadcastStream<EventEnvelope>;

/// Shared event bus built on top of `tokio::broadcast`.
///
/// Publishing is synchronous and never waits on subscribers, so it is safe to
/// call from blocking worker threads. A subscriber that lags behind the buffer
/// observes a `Lagged` error and skips ahead.
#[derive(Clone)]
pub struct EventBus {
    sender: Sender<EventEnvelope>,
    next_id: Arc<AtomicU64>,
}

impl EventBus {
    /// Construct a bus buffering up to `capacity` events per subscriber.
    ///
    /// A zero capacity is clamped to one slot.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Construct a bus with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Subscribe to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> EventStream {
        BroadcastStream::new(self.sender.subscribe())
    }

    /// Publish a new event to all subscribers and return the assigned id.
    ///
    /// Delivery is best-effort: with no live subscribers the event is dropped.
    pub fn publish(&self, event: Event) -> EventId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let envelope = EventEnvelope {
            id,
            timestamp: Utc::now(),
            event,
        };
        let _ = self.sender.send(envelope);
        id
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
    use std::collections::HashSet;
    use std::time::Duration;
    use tokio::time::timeout;
    use tokio_stream::StreamExt;
    use uuid::Uuid;

    fn progress(id: u128, value: f64) -> Event {
        Event::JobProgress {
            job_id: Uuid::from_u128(id),
            progress: value,
        }
    }

    #[tokio::test]
    async fn publish_assigns_sequential_ids() {
        let bus = EventBus::with_capacity(4);
        let mut stream = bus.subscribe();
        let first = bus.publish(progress(1, 0.1));
        let second = bus.publish(Event::JobFailed {
            job_id: Uuid::from_u128(1),
            message: "boom".into(),
        });
        assert_eq!(second, first + 1);

        let received = stream.next().await.and_then(Result::ok).map(|env| env.id);
        assert_eq!(received, Some(first));
    }

    #[test]
    fn publish_without_subscribers_is_dropped_silently() {
        let bus = EventBus::with_capacity(0);
        assert_eq!(bus.publish(progress(7, 0.5)), 1);
        assert_eq!(bus.publish(progress(7, 0.6)), 2);
    }

    #[tokio::test]
    async fn subscribe_streams_events() {
        let bus = EventBus::new();
        let mut stream = bus.subscribe();
        let id = bus.publish(progress(3, 0.5));
        let envelope = stream
            .next()
            .await
            .expect("stream item")
            .expect("broadcast ok");
        assert_eq!(envelope.id, id);
        assert!(matches!(envelope.event, Event::JobProgress { .. }));
    }

    #[tokio::test]
    async fn slow_subscriber_does_not_stall_publisher() {
        let bus = EventBus::with_capacity(8);
        let mut stream = bus.subscribe();

        timeout(Duration::from_secs(1), async {
            for step in 0..100_u32 {
                let _ = bus.publish(progress(9, f64::from(step) / 100.0));
            }
        })
        .await
        .expect("publishing must not block on a full buffer");

        let mut seen = HashSet::new();
        let mut lagged = false;
        while let Ok(Some(item)) = timeout(Duration::from_millis(50), stream.next()).await {
            match item {
                Ok(envelope) => {
                    seen.insert(envelope.id);
                }
                Err(_) => lagged = true,
            }
        }
        assert!(lagged, "subscriber should observe the overflow");
        assert!(seen.contains(&100));
        assert!(seen.len() <= 8);
    }
}
