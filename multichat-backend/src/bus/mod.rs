//! Pub/sub output channels and per-user lanes of in-flight message ids.

pub mod memory;
pub mod protocol;
pub mod redis_bus;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

pub use memory::InMemoryBus;
pub use protocol::ChannelEvent;
pub use redis_bus::RedisBus;

/// Payloads a slow subscriber may fall behind by before it is dropped.
pub const SUBSCRIBER_BUFFER: usize = 256;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Publish/subscribe transport plus the lane lists used for soft per-user
/// coordination. Lane operations mirror the Redis list commands they map to.
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BusError>;

    /// Receive every payload published on `channel` from now on. The receiver
    /// closes when the bus drops the subscription.
    async fn subscribe(&self, channel: &str) -> Result<mpsc::Receiver<String>, BusError>;

    /// Append to the lane and refresh its expiry.
    async fn lane_push(&self, lane: &str, message_id: i64, ttl: Duration) -> Result<(), BusError>;

    /// Remove every occurrence of `message_id`. Returns how many were removed.
    async fn lane_remove(&self, lane: &str, message_id: i64) -> Result<usize, BusError>;

    async fn lane_range(&self, lane: &str) -> Result<Vec<i64>, BusError>;

    /// Drop the whole lane.
    async fn lane_clear(&self, lane: &str) -> Result<(), BusError>;

    async fn ping(&self) -> bool {
        true
    }

    async fn publish_event(&self, channel: &str, event: &ChannelEvent) -> Result<(), BusError> {
        self.publish(channel, &event.encode()).await
    }
}
