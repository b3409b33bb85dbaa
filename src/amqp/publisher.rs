//! AMQP publisher for match notifications
//!
//! The matchmaker hands every formed match to a [`MatchPublisher`]; the
//! production implementation publishes a `MatchFound` envelope to a topic
//! exchange with retry and deduplication.

use crate::amqp::messages::{MessageEnvelope, MATCH_EVENTS_EXCHANGE, MATCH_FOUND_ROUTING_KEY};
use crate::error::{MatchmakingError, Result};
use crate::types::*;
use amqprs::{
    channel::{BasicPublishArguments, Channel, ExchangeDeclareArguments},
    BasicProperties,
};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Trait for delivering formed matches to clients
#[async_trait]
pub trait MatchPublisher: Send + Sync {
    /// Publish a MatchFound event
    async fn publish_match_found(&self, event: MatchFound) -> Result<()>;
}

/// Configuration for event publishing
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub exchange_name: String,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub enable_deduplication: bool,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            exchange_name: MATCH_EVENTS_EXCHANGE.to_string(),
            max_retries: 3,
            retry_delay_ms: 500,
            enable_deduplication: true,
        }
    }
}

/// AMQP-based match publisher implementation
pub struct AmqpMatchPublisher {
    channel: Channel,
    config: PublisherConfig,
    published_messages: std::sync::Mutex<std::collections::HashSet<String>>, // For deduplication
}

impl AmqpMatchPublisher {
    /// Create a new publisher and declare its exchange
    pub async fn new(channel: Channel, config: PublisherConfig) -> Result<Self> {
        let publisher = Self {
            channel,
            config,
            published_messages: std::sync::Mutex::new(std::collections::HashSet::new()),
        };

        publisher.setup_exchange().await?;

        Ok(publisher)
    }

    async fn setup_exchange(&self) -> Result<()> {
        let args = ExchangeDeclareArguments::new(&self.config.exchange_name, "topic");
        self.channel.exchange_declare(args).await.map_err(|e| {
            MatchmakingError::AmqpConnectionFailed {
                message: format!(
                    "Failed to declare exchange {}: {}",
                    self.config.exchange_name, e
                ),
            }
        })?;

        info!(
            "Successfully declared match events exchange '{}'",
            self.config.exchange_name
        );
        Ok(())
    }

    /// Publish to the configured exchange with retry logic
    async fn publish_envelope<T>(&self, envelope: &MessageEnvelope<T>) -> Result<()>
    where
        T: serde::Serialize + serde::de::DeserializeOwned,
    {
        if self.config.enable_deduplication && self.is_published(&envelope.correlation_id)? {
            debug!(
                "Message {} already published, skipping",
                envelope.correlation_id
            );
            return Ok(());
        }

        let mut retry_count = 0;
        let mut delay = Duration::from_millis(self.config.retry_delay_ms);

        loop {
            match self.try_publish(envelope).await {
                Ok(_) => {
                    if self.config.enable_deduplication {
                        self.mark_published(&envelope.correlation_id)?;
                    }

                    debug!(
                        "Successfully published message {} to exchange {}",
                        envelope.correlation_id, self.config.exchange_name
                    );
                    return Ok(());
                }
                Err(e) => {
                    retry_count += 1;
                    if retry_count > self.config.max_retries {
                        error!(
                            "Failed to publish message {} after {} retries: {}",
                            envelope.correlation_id, self.config.max_retries, e
                        );
                        return Err(e);
                    }

                    warn!(
                        "Publish attempt {} failed for message {}: {}. Retrying in {:?}",
                        retry_count, envelope.correlation_id, e, delay
                    );

                    sleep(delay).await;
                    delay = Duration::from_millis((delay.as_millis() as u64 * 2).min(5000));
                }
            }
        }
    }

    /// Single publish attempt
    async fn try_publish<T>(&self, envelope: &MessageEnvelope<T>) -> Result<()>
    where
        T: serde::Serialize + serde::de::DeserializeOwned,
    {
        let payload = envelope.to_bytes()?;

        let args = BasicPublishArguments::new(&self.config.exchange_name, &envelope.routing_key);
        let mut properties = BasicProperties::default();
        properties
            .with_message_id(&envelope.correlation_id)
            .with_timestamp(envelope.timestamp.timestamp() as u64)
            .with_content_type("application/json");

        self.channel
            .basic_publish(properties, payload, args)
            .await
            .map_err(|e| MatchmakingError::AmqpConnectionFailed {
                message: format!("Failed to publish message: {}", e),
            })?;

        Ok(())
    }

    fn is_published(&self, correlation_id: &str) -> Result<bool> {
        let published = self
            .published_messages
            .lock()
            .map_err(|_| MatchmakingError::lock_poisoned("published messages"))?;
        Ok(published.contains(correlation_id))
    }

    fn mark_published(&self, correlation_id: &str) -> Result<()> {
        let mut published = self
            .published_messages
            .lock()
            .map_err(|_| MatchmakingError::lock_poisoned("published messages"))?;
        published.insert(correlation_id.to_string());
        Ok(())
    }

    /// Get number of cached message IDs (for monitoring)
    pub fn cached_message_count(&self) -> usize {
        self.published_messages
            .lock()
            .map(|cache| cache.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl MatchPublisher for AmqpMatchPublisher {
    async fn publish_match_found(&self, event: MatchFound) -> Result<()> {
        // One envelope per match, so a retried delivery of the same match dedups
        let correlation_id = event.match_id.to_string();
        let envelope = MessageEnvelope::with_correlation_id(
            event,
            MATCH_FOUND_ROUTING_KEY.to_string(),
            correlation_id,
        );
        self.publish_envelope(&envelope).await
    }
}

/// Publisher that only logs formed matches, for running without a broker
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingMatchPublisher;

#[async_trait]
impl MatchPublisher for LoggingMatchPublisher {
    async fn publish_match_found(&self, event: MatchFound) -> Result<()> {
        let ids = |team: &[MatchedPlayer]| {
            team.iter()
                .map(|p| p.player_id.as_str())
                .collect::<Vec<_>>()
                .join(",")
        };
        info!(
            "Match {} not delivered (no broker) - team1: [{}], team2: [{}], average_rating: {}",
            event.match_id,
            ids(&event.team1),
            ids(&event.team2),
            event.average_rating
        );
        Ok(())
    }
}

/// In-memory publisher that records every event
#[derive(Debug, Default)]
pub struct MockMatchPublisher {
    published_events: std::sync::Mutex<Vec<MatchFound>>,
}

impl MockMatchPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all published events (for testing)
    pub fn get_published_events(&self) -> Vec<MatchFound> {
        self.published_events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn published_count(&self) -> usize {
        self.published_events
            .lock()
            .map(|events| events.len())
            .unwrap_or(0)
    }

    /// Clear published events (for testing)
    pub fn clear_events(&self) {
        if let Ok(mut events) = self.published_events.lock() {
            events.clear();
        }
    }
}

#[async_trait]
impl MatchPublisher for MockMatchPublisher {
    async fn publish_match_found(&self, event: MatchFound) -> Result<()> {
        if let Ok(mut events) = self.published_events.lock() {
            events.push(event);
        }
        Ok(())
    }
}
