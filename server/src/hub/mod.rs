//! Broadcast hub
//!
//! Fans ingest notifications out to live dashboard connections. The
//! payload is serialized once per commit and pushed through a bounded
//! broadcast ring; a subscriber that falls behind loses its oldest
//! pending notifications (latest-wins), never blocking the ingest path or
//! other subscribers. Dashboards poll on interaction, so a missed
//! notification costs at most one refresh delay.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::core::constants::HUB_CHANNEL_CAPACITY;
use crate::data::types::IngestNotification;

pub struct Hub {
    sender: broadcast::Sender<Arc<str>>,
    subscribers: Mutex<HashSet<u64>>,
    next_id: AtomicU64,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl Hub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(HUB_CHANNEL_CAPACITY);
        Self {
            sender,
            subscribers: Mutex::new(HashSet::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Serialize the notification once and push it to every subscriber
    /// with queue capacity
    pub fn publish(&self, notification: &IngestNotification) {
        let payload: Arc<str> = match serde_json::to_string(notification) {
            Ok(json) => json.into(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize hub notification");
                return;
            }
        };
        // Send errors mean no active subscribers
        let _ = self.sender.send(payload);
    }

    pub fn subscribe(self: &Arc<Self>) -> HubSubscriber {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().insert(id);
        tracing::debug!(subscriber = id, total = self.subscriber_count(), "Hub subscriber added");
        HubSubscriber {
            id,
            rx: self.sender.subscribe(),
            hub: Arc::clone(self),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    fn remove(&self, id: u64) {
        self.subscribers.lock().remove(&id);
        tracing::debug!(subscriber = id, total = self.subscriber_count(), "Hub subscriber removed");
    }
}

/// One live subscription; dropping it removes the subscriber immediately
pub struct HubSubscriber {
    id: u64,
    rx: broadcast::Receiver<Arc<str>>,
    hub: Arc<Hub>,
}

impl HubSubscriber {
    /// Receive the next notification payload. Lagged slots are skipped
    /// with a warning (drop-oldest). Returns `None` when the hub is gone.
    pub async fn recv(&mut self) -> Option<Arc<str>> {
        loop {
            match self.rx.recv().await {
                Ok(payload) => return Some(payload),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        subscriber = self.id,
                        dropped = n,
                        "Slow hub subscriber dropped oldest notifications"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for HubSubscriber {
    fn drop(&mut self) {
        self.hub.remove(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::SignalKind;
    use chrono::{TimeZone, Utc};

    fn notification(kind: SignalKind, count: u64) -> IngestNotification {
        IngestNotification {
            kind,
            count,
            service_names: vec!["claude-code".to_string()],
            latest_timestamp: Utc.timestamp_nanos(1_700_000_000_000_000_000),
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let hub = Arc::new(Hub::new());
        let mut sub = hub.subscribe();

        hub.publish(&notification(SignalKind::Metrics, 3));

        let payload = sub.recv().await.expect("Should receive");
        let parsed: IngestNotification = serde_json::from_str(&payload).unwrap();
        assert_eq!(parsed.kind, SignalKind::Metrics);
        assert_eq!(parsed.count, 3);
    }

    #[tokio::test]
    async fn test_publish_reaches_all_subscribers() {
        let hub = Arc::new(Hub::new());
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 2);

        hub.publish(&notification(SignalKind::Traces, 1));

        assert!(a.recv().await.is_some());
        assert!(b.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_noop() {
        let hub = Arc::new(Hub::new());
        hub.publish(&notification(SignalKind::Logs, 1));
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_drop_removes_subscriber() {
        let hub = Arc::new(Hub::new());
        let sub = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 1);
        drop(sub);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_slow_subscriber_drops_oldest_and_recovers() {
        let hub = Arc::new(Hub::new());
        let mut sub = hub.subscribe();

        // overflow the ring; the oldest notifications are dropped
        for i in 0..(HUB_CHANNEL_CAPACITY as u64 + 10) {
            hub.publish(&notification(SignalKind::Metrics, i));
        }

        let payload = sub.recv().await.expect("Should skip lag and deliver");
        let parsed: IngestNotification = serde_json::from_str(&payload).unwrap();
        assert!(
            parsed.count >= 10,
            "oldest notifications are gone, got count {}",
            parsed.count
        );
    }
}
