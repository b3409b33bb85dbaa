//! Matchmaker instance tying the queue, the finder and delivery together

pub mod manager;

pub use manager::{Matchmaker, MatchmakerStats};
