//! Skill Queue - skill-rating matchmaking queue and service
//!
//! The core is a concurrent queue of waiting players and a windowed search
//! that forms two balanced teams from the first rating-sorted window whose
//! spread fits a tolerance that widens with wait time. Around it sit an AMQP
//! adapter, Prometheus metrics and health endpoints for running it as a
//! service.
//!
//! ```rust
//! use skill_queue::amqp::MockMatchPublisher;
//! use skill_queue::Matchmaker;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! // Defaults: two teams of five, base range 100, +10 per second waited
//! let matchmaker = Matchmaker::new(Arc::new(MockMatchPublisher::new())).unwrap();
//! for i in 0..10 {
//!     matchmaker.enqueue(format!("player_{}", i), 1500 + i * 5).unwrap();
//! }
//!
//! let formed = matchmaker.try_match_default().await.unwrap().unwrap();
//! assert_eq!(formed.team1.len(), 5);
//! assert_eq!(formed.rating_spread, 45);
//! assert_eq!(matchmaker.queue_len().unwrap(), 0);
//! # });
//! ```

pub mod amqp;
pub mod config;
pub mod error;
pub mod matching;
pub mod matchmaker;
pub mod metrics;
pub mod queue;
pub mod service;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{MatchmakingError, QueueResult, Result};
pub use types::*;

// Re-export key components
pub use amqp::publisher::MatchPublisher;
pub use matching::{MatchCandidate, MatchFinder, MatchRequest};
pub use matchmaker::{Matchmaker, MatchmakerStats};
pub use queue::{Clock, ManualClock, QueueStore, SystemClock};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
