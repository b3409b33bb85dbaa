//! AMQP integration for the matchmaking service
//!
//! This module handles the broker connection, consumption of queue commands,
//! and publishing of match notifications.

pub mod connection;
pub mod handlers;
pub mod messages;
pub mod publisher;

// Re-export commonly used types
pub use connection::{AmqpConfig, AmqpConnection};
pub use handlers::{dispatch_command, CommandHandler, QueueCommandConsumer};
pub use messages::*;
pub use publisher::{
    AmqpMatchPublisher, LoggingMatchPublisher, MatchPublisher, MockMatchPublisher, PublisherConfig,
};
