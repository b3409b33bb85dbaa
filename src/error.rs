//! Error types for the matchmaking service
//!
//! The queue core reports failures through the typed [`MatchmakingError`]
//! taxonomy. Service plumbing (AMQP, configuration, startup) uses anyhow and
//! converts the typed errors with `?` where needed.

/// Result type alias for service-level code
pub type Result<T> = anyhow::Result<T>;

/// Result type for queue and match-search operations
pub type QueueResult<T> = std::result::Result<T, MatchmakingError>;

/// Custom error types for specific matchmaking scenarios
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchmakingError {
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("Player already queued: {player_id}")]
    DuplicateIdentity { player_id: String },

    #[error("Player not found: {player_id}")]
    NotFound { player_id: String },

    #[error("Match claim lost, player left the queue: {player_id}")]
    MatchRaceLost { player_id: String },

    #[error("Invalid queue request: {reason}")]
    InvalidQueueRequest { reason: String },

    #[error("AMQP connection failed: {message}")]
    AmqpConnectionFailed { message: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

impl MatchmakingError {
    /// Short, stable label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            MatchmakingError::InvalidArgument { .. } => "invalid_argument",
            MatchmakingError::DuplicateIdentity { .. } => "duplicate_identity",
            MatchmakingError::NotFound { .. } => "not_found",
            MatchmakingError::MatchRaceLost { .. } => "match_race_lost",
            MatchmakingError::InvalidQueueRequest { .. } => "invalid_queue_request",
            MatchmakingError::AmqpConnectionFailed { .. } => "amqp_connection_failed",
            MatchmakingError::ConfigurationError { .. } => "configuration_error",
            MatchmakingError::InternalError { .. } => "internal_error",
        }
    }

    pub(crate) fn invalid_argument(reason: impl Into<String>) -> Self {
        MatchmakingError::InvalidArgument {
            reason: reason.into(),
        }
    }

    pub(crate) fn lock_poisoned(what: &str) -> Self {
        MatchmakingError::InternalError {
            message: format!("Failed to acquire {} lock", what),
        }
    }
}
