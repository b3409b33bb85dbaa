//! AMQP message definitions and serialization

use crate::error::{MatchmakingError, Result};
use crate::types::*;
use serde_json;

/// AMQP queue and exchange names
pub const QUEUE_REQUEST_QUEUE: &str = "matchmaking.requests";
pub const MATCH_EVENTS_EXCHANGE: &str = "matchmaking.match_events";

/// Routing keys for events
pub const QUEUE_ENQUEUE_ROUTING_KEY: &str = "queue.enqueue";
pub const QUEUE_CANCEL_ROUTING_KEY: &str = "queue.cancel";
pub const MATCH_FOUND_ROUTING_KEY: &str = "match.found";

/// Message envelope with metadata
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MessageEnvelope<T> {
    pub payload: T,
    pub correlation_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub routing_key: String,
}

impl<T> MessageEnvelope<T>
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    /// Create a new message envelope
    pub fn new(payload: T, routing_key: String) -> Self {
        Self {
            payload,
            correlation_id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now(),
            routing_key,
        }
    }

    /// Create an envelope with a caller-chosen correlation id
    pub fn with_correlation_id(payload: T, routing_key: String, correlation_id: String) -> Self {
        Self {
            correlation_id,
            ..Self::new(payload, routing_key)
        }
    }

    /// Serialize the envelope to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| {
            MatchmakingError::InternalError {
                message: format!("Failed to serialize message: {}", e),
            }
            .into()
        })
    }

    /// Deserialize envelope from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            MatchmakingError::InvalidQueueRequest {
                reason: format!("Failed to deserialize message: {}", e),
            }
            .into()
        })
    }
}

/// Message serialization and validation utilities
pub struct MessageUtils;

impl MessageUtils {
    /// Serialize a queue command to bytes
    pub fn serialize_command(command: &QueueCommand) -> Result<Vec<u8>> {
        Self::validate_command(command)?;
        serde_json::to_vec(command).map_err(|e| {
            MatchmakingError::InternalError {
                message: format!("Failed to serialize queue command: {}", e),
            }
            .into()
        })
    }

    /// Deserialize a queue command from bytes
    pub fn deserialize_command(bytes: &[u8]) -> Result<QueueCommand> {
        let command: QueueCommand =
            serde_json::from_slice(bytes).map_err(|e| MatchmakingError::InvalidQueueRequest {
                reason: format!("Failed to deserialize queue command: {}", e),
            })?;

        Self::validate_command(&command)?;
        Ok(command)
    }

    /// Validate a queue command
    pub fn validate_command(command: &QueueCommand) -> Result<()> {
        if command.player_id().trim().is_empty() {
            return Err(MatchmakingError::InvalidQueueRequest {
                reason: "Player ID cannot be empty".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Serialize any AMQP message to bytes
    pub fn serialize_message<T: serde::Serialize>(message: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(message).map_err(|e| {
            MatchmakingError::InternalError {
                message: format!("Failed to serialize message: {}", e),
            }
            .into()
        })
    }

    /// Get routing key for a message type
    pub fn get_routing_key(message: &AmqpMessage) -> &'static str {
        match message {
            AmqpMessage::QueueRequest(_) => QUEUE_ENQUEUE_ROUTING_KEY,
            AmqpMessage::CancelRequest(_) => QUEUE_CANCEL_ROUTING_KEY,
            AmqpMessage::MatchFound(_) => MATCH_FOUND_ROUTING_KEY,
        }
    }
}
