//! Common types used throughout the matchmaking service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Opaque unique identifier for a player
pub type PlayerId = String;

/// Integer skill rating (MMR)
pub type Rating = i64;

/// Distance between two ratings; wide enough for any pair of `Rating`s
pub type RatingSpread = u64;

/// Unique identifier for formed matches
pub type MatchId = Uuid;

/// A player waiting in (or taken out of) the queue
///
/// Players are only ever constructed by the queue store, which stamps the
/// enqueue time and the membership ticket. Callers hand over an identity and
/// a rating and never see their own data mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub rating: Rating,
    pub enqueued_at: Instant,
    ticket: u64,
}

impl Player {
    pub(crate) fn queued(id: PlayerId, rating: Rating, enqueued_at: Instant, ticket: u64) -> Self {
        Self {
            id,
            rating,
            enqueued_at,
            ticket,
        }
    }

    /// Membership ticket assigned at insertion, strictly increasing per store
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    /// Time spent in the queue as of `now`, zero if `now` precedes the enqueue
    pub fn wait_time(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.enqueued_at)
    }
}

/// Two balanced teams formed from one accepted window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub id: MatchId,
    /// Even ranks of the rating-sorted window
    pub team1: Vec<Player>,
    /// Odd ranks of the rating-sorted window
    pub team2: Vec<Player>,
    /// Floor of the mean rating over both teams
    pub average_rating: Rating,
    /// Highest minus lowest rating in the window
    pub rating_spread: RatingSpread,
    pub created_at: DateTime<Utc>,
}

impl Match {
    /// Number of players on each side
    pub fn team_size(&self) -> usize {
        self.team1.len()
    }

    /// Every matched player, team1 first
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.team1.iter().chain(self.team2.iter())
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.players().map(|p| p.id.clone()).collect()
    }

    /// Longest wait among the matched players
    pub fn longest_wait(&self, now: Instant) -> Duration {
        self.players()
            .map(|p| p.wait_time(now))
            .max()
            .unwrap_or_default()
    }
}

/// AMQP Message Types
/// Request to join the matchmaking queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueRequest {
    pub player_id: PlayerId,
    pub rating: Rating,
    pub timestamp: DateTime<Utc>,
}

/// Request to leave the matchmaking queue before being matched
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelRequest {
    pub player_id: PlayerId,
    pub timestamp: DateTime<Utc>,
}

/// Inbound command consumed from the request queue
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum QueueCommand {
    Enqueue(QueueRequest),
    Cancel(CancelRequest),
}

impl QueueCommand {
    pub fn player_id(&self) -> &str {
        match self {
            QueueCommand::Enqueue(request) => &request.player_id,
            QueueCommand::Cancel(request) => &request.player_id,
        }
    }
}

/// A matched player as announced to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedPlayer {
    pub player_id: PlayerId,
    pub rating: Rating,
    pub wait_time_ms: u64,
}

/// Event emitted when a match has been formed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchFound {
    pub match_id: MatchId,
    pub team1: Vec<MatchedPlayer>,
    pub team2: Vec<MatchedPlayer>,
    pub average_rating: Rating,
    pub rating_spread: RatingSpread,
    pub timestamp: DateTime<Utc>,
}

impl MatchFound {
    /// Build the outbound event, measuring waits against `now`
    pub fn from_match(formed: &Match, now: Instant) -> Self {
        let describe = |team: &[Player]| {
            team.iter()
                .map(|p| MatchedPlayer {
                    player_id: p.id.clone(),
                    rating: p.rating,
                    wait_time_ms: p.wait_time(now).as_millis() as u64,
                })
                .collect()
        };

        Self {
            match_id: formed.id,
            team1: describe(&formed.team1),
            team2: describe(&formed.team2),
            average_rating: formed.average_rating,
            rating_spread: formed.rating_spread,
            timestamp: formed.created_at,
        }
    }
}

/// Union type for all AMQP messages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AmqpMessage {
    QueueRequest(QueueRequest),
    CancelRequest(CancelRequest),
    MatchFound(MatchFound),
}
