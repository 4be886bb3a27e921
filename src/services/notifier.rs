//! Rejection notification publisher.
//!
//! Notifications go to a Redis stream; the entry id assigned by `XADD` is the
//! message id. The consumer side lives in `rejection_consumer`.

use crate::errors::PublishError;
use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Stream field carrying the notification text.
pub const PAYLOAD_FIELD: &str = "payload";

/// Publishes raw text payloads to a named channel.
#[async_trait]
pub trait RejectionPublisher: Send + Sync {
    /// Returns the id the channel assigned to the message.
    async fn publish(&self, channel: &str, payload: &str) -> Result<String, PublishError>;
}

/// Redis Streams publisher.
///
/// The connection manager is created on first use and then shared by every
/// request; it reconnects on its own. A Redis outage at startup therefore
/// only shows up as failed publishes.
#[derive(Clone)]
pub struct RedisStreamPublisher {
    client: redis::Client,
    connection: Arc<OnceCell<ConnectionManager>>,
}

impl RedisStreamPublisher {
    pub fn new(client: redis::Client) -> Self {
        Self {
            client,
            connection: Arc::new(OnceCell::new()),
        }
    }

    /// Parses the URL; does not connect.
    pub fn open(redis_url: &str) -> Result<Self, PublishError> {
        Ok(Self::new(redis::Client::open(redis_url)?))
    }

    async fn connection(&self) -> Result<ConnectionManager, PublishError> {
        let connection = self
            .connection
            .get_or_try_init(|| ConnectionManager::new(self.client.clone()))
            .await
            .map_err(|e| PublishError::Unavailable(format!("connecting to redis: {}", e)))?;
        Ok(connection.clone())
    }
}

#[async_trait]
impl RejectionPublisher for RedisStreamPublisher {
    async fn publish(&self, channel: &str, payload: &str) -> Result<String, PublishError> {
        if channel.trim().is_empty() {
            return Err(PublishError::EmptyChannel);
        }
        let mut connection = self.connection().await?;
        let id: String = connection
            .xadd(channel, "*", &[(PAYLOAD_FIELD, payload)])
            .await?;
        Ok(id)
    }
}
