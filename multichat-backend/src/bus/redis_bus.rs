//! Redis-backed message bus.
//!
//! Channels map to Redis PUBLISH, lanes to Redis lists, so the web tier and
//! other workers subscribed to the same Redis see every event.

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::aio::MultiplexedConnection;
use std::time::Duration;
use tokio::sync::mpsc;

use super::{BusError, MessageBus, SUBSCRIBER_BUFFER};

pub struct RedisBus {
    client: redis::Client,
    conn: MultiplexedConnection,
}

impl RedisBus {
    pub async fn connect(url: &str) -> Result<Self, BusError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        log::info!("[BUS] Connected to Redis at {}", url);
        Ok(Self { client, conn })
    }
}

#[async_trait]
impl MessageBus for RedisBus {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BusError> {
        let mut conn = self.conn.clone();
        redis::cmd("PUBLISH")
            .arg(channel)
            .arg(payload)
            .query_async::<i64>(&mut conn)
            .await?;
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<mpsc::Receiver<String>, BusError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(channel).await?;

        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let channel = channel.to_string();
        tokio::spawn(async move {
            let mut messages = pubsub.into_on_message();
            while let Some(msg) = messages.next().await {
                let payload = match msg.get_payload::<String>() {
                    Ok(payload) => payload,
                    Err(e) => {
                        log::warn!("[BUS] Dropping undecodable payload on {}: {}", channel, e);
                        continue;
                    }
                };
                if tx.send(payload).await.is_err() {
                    break;
                }
            }
            log::debug!("[BUS] Subscription to {} closed", channel);
        });
        Ok(rx)
    }

    async fn lane_push(&self, lane: &str, message_id: i64, ttl: Duration) -> Result<(), BusError> {
        let mut conn = self.conn.clone();
        redis::pipe()
            .cmd("RPUSH")
            .arg(lane)
            .arg(message_id)
            .ignore()
            .cmd("EXPIRE")
            .arg(lane)
            .arg(ttl.as_secs().max(1))
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn lane_remove(&self, lane: &str, message_id: i64) -> Result<usize, BusError> {
        let mut conn = self.conn.clone();
        let removed = redis::cmd("LREM")
            .arg(lane)
            .arg(0)
            .arg(message_id)
            .query_async::<i64>(&mut conn)
            .await?;
        Ok(removed.max(0) as usize)
    }

    async fn lane_range(&self, lane: &str) -> Result<Vec<i64>, BusError> {
        let mut conn = self.conn.clone();
        let raw = redis::cmd("LRANGE")
            .arg(lane)
            .arg(0)
            .arg(-1)
            .query_async::<Vec<String>>(&mut conn)
            .await?;

        Ok(raw
            .into_iter()
            .filter_map(|item| match item.parse() {
                Ok(id) => Some(id),
                Err(_) => {
                    log::warn!("[BUS] Ignoring non-numeric entry {:?} in lane {}", item, lane);
                    None
                }
            })
            .collect())
    }

    async fn lane_clear(&self, lane: &str) -> Result<(), BusError> {
        let mut conn = self.conn.clone();
        // start > end empties the list
        redis::cmd("LTRIM")
            .arg(lane)
            .arg(1)
            .arg(0)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn ping(&self) -> bool {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<String>(&mut conn).await.is_ok()
    }
}
