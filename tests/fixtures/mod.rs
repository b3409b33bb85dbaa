//! Test fixtures and mock implementations for integration testing

#![allow(dead_code)]

use async_trait::async_trait;
use skill_queue::amqp::publisher::MatchPublisher;
use skill_queue::config::MatchmakingConfig;
use skill_queue::error::{MatchmakingError, Result};
use skill_queue::metrics::MetricsCollector;
use skill_queue::queue::{ManualClock, QueueStore};
use skill_queue::types::{Match, MatchFound, PlayerId, Rating};
use skill_queue::Matchmaker;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Publisher that captures every MatchFound event
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    published_events: Arc<Mutex<Vec<MatchFound>>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_published_events(&self) -> Vec<MatchFound> {
        self.published_events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn event_count(&self) -> usize {
        self.get_published_events().len()
    }
}

#[async_trait]
impl MatchPublisher for RecordingPublisher {
    async fn publish_match_found(&self, event: MatchFound) -> Result<()> {
        if let Ok(mut events) = self.published_events.lock() {
            events.push(event);
        }
        Ok(())
    }
}

/// Publisher whose broker is always down
#[derive(Debug, Default)]
pub struct FailingPublisher {
    attempts: Mutex<usize>,
}

impl FailingPublisher {
    pub fn attempts(&self) -> usize {
        self.attempts.lock().map(|a| *a).unwrap_or_default()
    }
}

#[async_trait]
impl MatchPublisher for FailingPublisher {
    async fn publish_match_found(&self, _event: MatchFound) -> Result<()> {
        if let Ok(mut attempts) = self.attempts.lock() {
            *attempts += 1;
        }
        Err(MatchmakingError::AmqpConnectionFailed {
            message: "broker unavailable".to_string(),
        }
        .into())
    }
}

/// A matchmaker on a manual clock with a recording publisher
pub struct TestSystem {
    pub matchmaker: Matchmaker,
    pub publisher: Arc<RecordingPublisher>,
    pub clock: Arc<ManualClock>,
}

impl TestSystem {
    pub fn new(config: MatchmakingConfig) -> Self {
        let clock = Arc::new(ManualClock::new());
        let store = Arc::new(QueueStore::with_clock(clock.clone()));
        let publisher = Arc::new(RecordingPublisher::new());
        let matchmaker = Matchmaker::with_components(
            store,
            config,
            publisher.clone(),
            Arc::new(MetricsCollector::new().expect("metrics collector")),
        )
        .expect("valid matchmaking config");

        Self {
            matchmaker,
            publisher,
            clock,
        }
    }

    /// Enqueue `(id, rating)` pairs in order
    pub fn enqueue_all(&self, players: &[(&str, Rating)]) {
        for (id, rating) in players {
            self.matchmaker
                .enqueue(*id, *rating)
                .expect("enqueue should succeed");
        }
    }

    pub fn queued_ids(&self) -> Vec<PlayerId> {
        self.matchmaker
            .snapshot()
            .expect("snapshot")
            .into_iter()
            .map(|p| p.id)
            .collect()
    }
}

pub fn config(team_size: usize, base_range: f64, range_expansion: f64) -> MatchmakingConfig {
    MatchmakingConfig {
        base_range,
        range_expansion,
        team_size,
    }
}

/// The six-player queue used by the reference scenarios
pub fn six_player_queue() -> Vec<(&'static str, Rating)> {
    vec![
        ("p1000", 1000),
        ("p1010", 1010),
        ("p1020", 1020),
        ("p1030", 1030),
        ("p1040", 1040),
        ("p1050", 1050),
    ]
}

pub fn ratings(players: &[skill_queue::types::Player]) -> Vec<Rating> {
    players.iter().map(|p| p.rating).collect()
}

/// Assert the structural invariants every formed match must satisfy
pub fn assert_valid_match(formed: &Match, team_size: usize, residual: &[PlayerId]) {
    assert_eq!(formed.team1.len(), team_size);
    assert_eq!(formed.team2.len(), team_size);

    let ids: HashSet<_> = formed.player_ids().into_iter().collect();
    assert_eq!(ids.len(), team_size * 2, "match contains duplicate players");
    for id in residual {
        assert!(!ids.contains(id), "{} is both matched and still queued", id);
    }

    let sum: i128 = formed.players().map(|p| p.rating as i128).sum();
    let expected = sum.div_euclid((team_size * 2) as i128) as Rating;
    assert_eq!(formed.average_rating, expected);
}
