//! Rejection consumer. Subscribes to the rejection stream and logs each
//! denied request.
//!
//! Delivery is at-least-once: an entry is acknowledged only after it has been
//! processed, and on start the consumer first re-reads the entries it was
//! given before but never acknowledged.

use crate::{
    config::ConsumerConfig,
    errors::ConsumerError,
    models::notification::RejectionNotification,
    services::notifier::PAYLOAD_FIELD,
};
use async_trait::async_trait;
use redis::{
    AsyncCommands,
    aio::MultiplexedConnection,
    streams::{StreamReadOptions, StreamReadReply},
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// One received entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub id: String,
    /// `None` when the entry has no readable payload field.
    pub payload: Option<String>,
}

/// Subscription side of the rejection channel.
#[async_trait]
pub trait RejectionSource: Send {
    /// Next batch; empty when nothing is waiting.
    async fn receive(&mut self) -> Result<Vec<Delivery>, ConsumerError>;

    async fn ack(&mut self, id: &str) -> Result<(), ConsumerError>;
}

/// Redis Streams consumer-group subscription.
pub struct RedisStreamSource {
    connection: MultiplexedConnection,
    stream: String,
    group: String,
    consumer: String,
    batch_size: usize,
    cursor: ReadCursor,
}

/// Where the next group read starts.
///
/// A fresh consumer first replays the entries it was handed earlier but never
/// acknowledged, then switches to new entries once that replay comes back empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadCursor {
    Pending,
    New,
}

impl ReadCursor {
    pub fn start_id(self) -> &'static str {
        match self {
            ReadCursor::Pending => "0",
            ReadCursor::New => ">",
        }
    }

    /// Cursor for the read after one that returned `delivered` entries.
    pub fn advance(self, delivered: usize) -> Self {
        match self {
            ReadCursor::Pending if delivered == 0 => ReadCursor::New,
            cursor => cursor,
        }
    }
}

/// Flatten an `XREADGROUP` reply into deliveries, in stream order.
pub fn deliveries_from_reply(reply: Option<StreamReadReply>) -> Vec<Delivery> {
    reply
        .map(|r| r.keys)
        .unwrap_or_default()
        .into_iter()
        .flat_map(|key| key.ids)
        .map(|entry| Delivery {
            payload: entry.get::<String>(PAYLOAD_FIELD),
            id: entry.id,
        })
        .collect()
}

impl RedisStreamSource {
    /// Connect and make sure the consumer group exists.
    pub async fn connect(cfg: &ConsumerConfig) -> Result<Self, ConsumerError> {
        let client = redis::Client::open(cfg.redis_url.as_str())?;
        let connection = client.get_multiplexed_async_connection().await?;
        let mut source = Self {
            connection,
            stream: cfg.stream.clone(),
            group: cfg.group.clone(),
            consumer: cfg.consumer_name.clone(),
            batch_size: cfg.batch_size,
            cursor: ReadCursor::Pending,
        };
        source.ensure_group().await?;
        Ok(source)
    }

    pub fn subscription(&self) -> String {
        format!("{}/{}", self.stream, self.group)
    }

    async fn ensure_group(&mut self) -> Result<(), ConsumerError> {
        let created: redis::RedisResult<()> = self
            .connection
            .xgroup_create_mkstream(&self.stream, &self.group, "$")
            .await;
        match created {
            Ok(()) => {
                info!(stream = %self.stream, group = %self.group, "created consumer group");
                Ok(())
            }
            Err(err) if err.code() == Some("BUSYGROUP") => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl RejectionSource for RedisStreamSource {
    async fn receive(&mut self) -> Result<Vec<Delivery>, ConsumerError> {
        let options = StreamReadOptions::default()
            .group(&self.group, &self.consumer)
            .count(self.batch_size);

        let reply: Option<StreamReadReply> = self
            .connection
            .xread_options(&[&self.stream], &[self.cursor.start_id()], &options)
            .await
            .map_err(|e| ConsumerError::Receive(format!("{}: {}", self.stream, e)))?;

        let deliveries = deliveries_from_reply(reply);
        let next = self.cursor.advance(deliveries.len());
        if next != self.cursor {
            debug!(stream = %self.stream, "pending entries drained");
            self.cursor = next;
        }
        Ok(deliveries)
    }

    async fn ack(&mut self, id: &str) -> Result<(), ConsumerError> {
        let _: i64 = self
            .connection
            .xack(&self.stream, &self.group, &[id])
            .await?;
        Ok(())
    }
}

/// Log one rejection. Fails only when the entry carries no payload.
pub fn process_delivery(delivery: &Delivery) -> Result<(), ConsumerError> {
    let payload = delivery
        .payload
        .as_deref()
        .ok_or_else(|| ConsumerError::MalformedEntry {
            id: delivery.id.clone(),
        })?;

    match RejectionNotification::parse(payload) {
        Some(notification) => error!(
            message_id = %delivery.id,
            country = %notification.country,
            file = %notification.requested_file,
            "Forbidden request from {}. Access Denied due to export restrictions!",
            notification.country
        ),
        None => error!(
            message_id = %delivery.id,
            "Forbidden request: {}. Access Denied due to export restrictions!",
            payload
        ),
    }
    Ok(())
}

/// Receive, process and acknowledge until `shutdown` is cancelled.
///
/// Cancellation interrupts only the receive and the idle wait; a batch in
/// hand is always finished and acknowledged first. Returns the number of
/// processed entries. A processing or transport error ends the subscription.
pub async fn run_consumer<S: RejectionSource>(
    source: &mut S,
    poll_interval: Duration,
    shutdown: CancellationToken,
) -> Result<u64, ConsumerError> {
    let mut processed = 0_u64;

    loop {
        let batch = tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            batch = source.receive() => batch?,
        };

        if batch.is_empty() {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(poll_interval) => continue,
            }
        }

        for delivery in batch {
            process_delivery(&delivery)?;
            source.ack(&delivery.id).await?;
            processed += 1;
        }
    }

    info!(processed, "subscription cancelled");
    Ok(processed)
}
