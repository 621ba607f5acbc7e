//! In-process message bus for single-node deployments and tests.

use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use super::{BusError, MessageBus, SUBSCRIBER_BUFFER};

struct Lane {
    items: Vec<i64>,
    expires_at: Instant,
}

impl Lane {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Fans published payloads out to per-channel subscribers; lanes are plain
/// vectors with a lazily enforced expiry.
pub struct InMemoryBus {
    subscribers: DashMap<String, Vec<mpsc::Sender<String>>>,
    lanes: DashMap<String, Lane>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
            lanes: DashMap::new(),
        }
    }

    pub fn add_subscriber(&self, channel: &str) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.subscribers.entry(channel.to_string()).or_default().push(tx);
        log::debug!("[BUS] Subscriber added to channel {}", channel);
        rx
    }

    #[cfg(test)]
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.subscribers.get(channel).map(|subs| subs.len()).unwrap_or(0)
    }

    fn drop_if_expired(&self, lane: &str) {
        self.lanes.remove_if(lane, |_, l| l.is_expired());
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BusError> {
        if let Some(mut subs) = self.subscribers.get_mut(channel) {
            // Subscriber channel full or closed
            subs.retain(|tx| tx.try_send(payload.to_string()).is_ok());
        }
        self.subscribers.remove_if(channel, |_, subs| subs.is_empty());
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<mpsc::Receiver<String>, BusError> {
        Ok(self.add_subscriber(channel))
    }

    async fn lane_push(&self, lane: &str, message_id: i64, ttl: Duration) -> Result<(), BusError> {
        self.drop_if_expired(lane);
        let mut entry = self.lanes.entry(lane.to_string()).or_insert_with(|| Lane {
            items: Vec::new(),
            expires_at: Instant::now(),
        });
        entry.items.push(message_id);
        entry.expires_at = Instant::now() + ttl;
        Ok(())
    }

    async fn lane_remove(&self, lane: &str, message_id: i64) -> Result<usize, BusError> {
        self.drop_if_expired(lane);
        let Some(mut entry) = self.lanes.get_mut(lane) else {
            return Ok(0);
        };
        let before = entry.items.len();
        entry.items.retain(|id| *id != message_id);
        let removed = before - entry.items.len();
        drop(entry);

        self.lanes.remove_if(lane, |_, l| l.items.is_empty());
        Ok(removed)
    }

    async fn lane_range(&self, lane: &str) -> Result<Vec<i64>, BusError> {
        self.drop_if_expired(lane);
        Ok(self
            .lanes
            .get(lane)
            .map(|l| l.items.clone())
            .unwrap_or_default())
    }

    async fn lane_clear(&self, lane: &str) -> Result<(), BusError> {
        self.lanes.remove(lane);
        Ok(())
    }
}
