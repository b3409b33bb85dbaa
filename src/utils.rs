//! Utility functions for the matchmaking service

use crate::types::{Player, Rating};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique match ID
pub fn generate_match_id() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Floor of the mean rating, rounding toward negative infinity
///
/// Sums in 128 bits so extreme ratings cannot overflow. Returns 0 for an
/// empty slice.
pub fn floor_average_rating(players: &[Player]) -> Rating {
    if players.is_empty() {
        return 0;
    }
    let sum: i128 = players.iter().map(|p| p.rating as i128).sum();
    sum.div_euclid(players.len() as i128) as Rating
}
