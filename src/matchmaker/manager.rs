//! Matchmaker: the owned queue instance and its inbound interface
//!
//! A `Matchmaker` bundles one queue store, the match finder that searches it,
//! the default search parameters, and the collaborator that delivers formed
//! matches. Handles are cheap to clone and share one queue.

use crate::amqp::publisher::MatchPublisher;
use crate::config::MatchmakingConfig;
use crate::error::{MatchmakingError, QueueResult};
use crate::matching::{MatchCandidate, MatchFinder, MatchRequest};
use crate::metrics::MetricsCollector;
use crate::queue::{Clock, QueueStore};
use crate::types::{Match, MatchFound, Player, PlayerId, Rating};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Statistics about matchmaker operations
#[derive(Debug, Clone, Default, Serialize)]
pub struct MatchmakerStats {
    /// Total number of players admitted to the queue
    pub players_enqueued: u64,
    /// Total number of players that cancelled before matching
    pub players_cancelled: u64,
    /// Total number of matches formed
    pub matches_formed: u64,
    /// Total number of players placed into matches
    pub players_matched: u64,
    /// Searches abandoned because a candidate left mid-claim
    pub races_lost: u64,
    /// Formed matches whose delivery failed
    pub delivery_failures: u64,
    /// Current number of players waiting
    pub players_waiting: usize,
    /// When the most recent match was formed
    pub last_match_at: Option<DateTime<Utc>>,
}

/// The main matchmaker
#[derive(Clone)]
pub struct Matchmaker {
    store: Arc<QueueStore>,
    finder: MatchFinder,
    /// Parameters used by `try_match_default`
    config: MatchmakingConfig,
    publisher: Arc<dyn MatchPublisher>,
    stats: Arc<RwLock<MatchmakerStats>>,
    metrics_collector: Arc<MetricsCollector>,
    clock: Arc<dyn Clock>,
}

impl Matchmaker {
    /// Create a matchmaker with default parameters, the system clock and a
    /// private metrics registry
    pub fn new(publisher: Arc<dyn MatchPublisher>) -> QueueResult<Self> {
        let metrics_collector =
            MetricsCollector::new().map_err(|e| MatchmakingError::InternalError {
                message: format!("Failed to create metrics collector: {}", e),
            })?;

        Ok(Self::build(
            Arc::new(QueueStore::new()),
            MatchmakingConfig::default(),
            publisher,
            Arc::new(metrics_collector),
        ))
    }

    /// Create a matchmaker with explicit defaults and a shared metrics collector
    pub fn with_metrics(
        config: MatchmakingConfig,
        publisher: Arc<dyn MatchPublisher>,
        metrics_collector: Arc<MetricsCollector>,
    ) -> QueueResult<Self> {
        Self::with_components(
            Arc::new(QueueStore::new()),
            config,
            publisher,
            metrics_collector,
        )
    }

    /// Create a matchmaker around an existing store; the store's clock is used
    pub fn with_components(
        store: Arc<QueueStore>,
        config: MatchmakingConfig,
        publisher: Arc<dyn MatchPublisher>,
        metrics_collector: Arc<MetricsCollector>,
    ) -> QueueResult<Self> {
        config.validate()?;
        Ok(Self::build(store, config, publisher, metrics_collector))
    }

    fn build(
        store: Arc<QueueStore>,
        config: MatchmakingConfig,
        publisher: Arc<dyn MatchPublisher>,
        metrics_collector: Arc<MetricsCollector>,
    ) -> Self {
        let clock = store.clock();
        Self {
            finder: MatchFinder::new(store.clone()),
            store,
            config,
            publisher,
            stats: Arc::new(RwLock::new(MatchmakerStats::default())),
            metrics_collector,
            clock,
        }
    }

    /// Add a player to the queue
    pub fn enqueue(&self, player_id: impl Into<PlayerId>, rating: Rating) -> QueueResult<Player> {
        let player = match self.store.add(player_id, rating) {
            Ok(player) => player,
            Err(e) => {
                debug!("Enqueue rejected: {}", e);
                self.metrics_collector.record_rejection(e.kind());
                return Err(e);
            }
        };

        let queue_len = self.store.len().unwrap_or_default();
        self.update_stats(|stats| {
            stats.players_enqueued += 1;
            stats.players_waiting = queue_len;
        });
        self.metrics_collector.record_enqueued(queue_len);

        info!(
            "Player enqueued - player_id: '{}', rating: {}, queue_len: {}",
            player.id, player.rating, queue_len
        );
        Ok(player)
    }

    /// Remove a waiting player from the queue
    pub fn cancel(&self, player_id: &str) -> QueueResult<Player> {
        let removed = self
            .store
            .remove(&[player_id.to_string()])
            .and_then(|mut removed| {
                removed.pop().ok_or_else(|| MatchmakingError::NotFound {
                    player_id: player_id.to_string(),
                })
            });

        let player = match removed {
            Ok(player) => player,
            Err(e) => {
                debug!("Cancel rejected: {}", e);
                self.metrics_collector.record_rejection(e.kind());
                return Err(e);
            }
        };

        let queue_len = self.store.len().unwrap_or_default();
        self.update_stats(|stats| {
            stats.players_cancelled += 1;
            stats.players_waiting = queue_len;
        });
        self.metrics_collector.record_cancelled(1, queue_len);

        info!(
            "Player cancelled - player_id: '{}', waited: {:.2}s, queue_len: {}",
            player.id,
            player.wait_time(self.clock.now()).as_secs_f64(),
            queue_len
        );
        Ok(player)
    }

    /// Search for and claim one match at an injected `now`
    ///
    /// Fails with `MatchRaceLost` when a candidate left the queue between the
    /// snapshot and the claim; the queue is unchanged in that case.
    pub fn find_match(
        &self,
        team_size: usize,
        base_range: f64,
        range_expansion: f64,
        now: Instant,
    ) -> QueueResult<Option<Match>> {
        let request = MatchRequest::new(team_size, base_range, range_expansion)?;
        self.find_with(&request, now)
    }

    fn find_with(&self, request: &MatchRequest, now: Instant) -> QueueResult<Option<Match>> {
        let timer = self.metrics_collector.start_timer();
        let result = self.finder.find_match(request, now);
        self.record_search(&result, now, timer.stop());
        result
    }

    fn record_search(
        &self,
        result: &QueueResult<Option<Match>>,
        now: Instant,
        duration: Duration,
    ) {
        match result {
            Ok(Some(formed)) => {
                let queue_len = self.store.len().unwrap_or_default();
                let matched = (formed.team1.len() + formed.team2.len()) as u64;
                self.update_stats(|stats| {
                    stats.matches_formed += 1;
                    stats.players_matched += matched;
                    stats.players_waiting = queue_len;
                    stats.last_match_at = Some(formed.created_at);
                });
                self.metrics_collector.record_match_search("formed", duration);
                self.metrics_collector
                    .record_match_formed(formed, now, queue_len);
            }
            Ok(None) => {
                self.metrics_collector.record_match_search("none", duration);
            }
            Err(MatchmakingError::MatchRaceLost { player_id }) => {
                warn!(
                    "Match claim lost to a concurrent update - player_id: '{}'",
                    player_id
                );
                self.update_stats(|stats| stats.races_lost += 1);
                self.metrics_collector.record_race_lost();
                self.metrics_collector
                    .record_match_search("race_lost", duration);
            }
            Err(e) => {
                self.metrics_collector.record_match_search("error", duration);
                debug!("Match search failed: {}", e);
            }
        }
    }

    /// Search at an injected `now` without claiming anyone
    ///
    /// The returned candidate is settled with [`Matchmaker::complete_match`];
    /// players may come and go in between.
    pub fn propose_match(
        &self,
        team_size: usize,
        base_range: f64,
        range_expansion: f64,
        now: Instant,
    ) -> QueueResult<Option<MatchCandidate>> {
        let request = MatchRequest::new(team_size, base_range, range_expansion)?;
        self.finder.search(&request, now)
    }

    /// Claim a proposed candidate and deliver the match
    ///
    /// Behaves like the second half of `try_match`: a candidate who left the
    /// queue since the proposal makes this pass report no match.
    pub async fn complete_match(&self, candidate: MatchCandidate) -> QueueResult<Option<Match>> {
        let now = candidate.searched_at;
        let timer = self.metrics_collector.start_timer();
        let result = self.finder.claim(candidate).map(Some);
        self.record_search(&result, now, timer.stop());
        self.deliver(result, now).await
    }

    /// Search at the current time and deliver the match if one forms
    ///
    /// A lost race is reported as no match for this pass. A delivery failure
    /// is logged and counted; the match is still returned because its players
    /// have already left the queue.
    pub async fn try_match(
        &self,
        team_size: usize,
        base_range: f64,
        range_expansion: f64,
    ) -> QueueResult<Option<Match>> {
        let request = MatchRequest::new(team_size, base_range, range_expansion)?;
        self.try_match_with(&request).await
    }

    /// `try_match` using the configured defaults
    pub async fn try_match_default(&self) -> QueueResult<Option<Match>> {
        let request = self.config.request()?;
        self.try_match_with(&request).await
    }

    async fn try_match_with(&self, request: &MatchRequest) -> QueueResult<Option<Match>> {
        let now = self.clock.now();
        let result = self.find_with(request, now);
        self.deliver(result, now).await
    }

    /// Publish a formed match; a lost race becomes no match
    async fn deliver(
        &self,
        result: QueueResult<Option<Match>>,
        now: Instant,
    ) -> QueueResult<Option<Match>> {
        let formed = match result {
            Ok(Some(formed)) => formed,
            Ok(None) => return Ok(None),
            Err(MatchmakingError::MatchRaceLost { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        let event = MatchFound::from_match(&formed, now);
        if let Err(e) = self.publisher.publish_match_found(event).await {
            error!(
                "Failed to deliver match {} ({} players): {}",
                formed.id,
                formed.team1.len() + formed.team2.len(),
                e
            );
            self.update_stats(|stats| stats.delivery_failures += 1);
            self.metrics_collector.record_delivery_failure();
        }

        Ok(Some(formed))
    }

    /// Form matches with the configured defaults until none fits
    pub async fn drain_matches(&self) -> QueueResult<Vec<Match>> {
        let mut formed = Vec::new();
        while let Some(next) = self.try_match_default().await? {
            formed.push(next);
        }

        if !formed.is_empty() {
            debug!("Scheduling pass formed {} matches", formed.len());
        }
        Ok(formed)
    }

    /// Get matchmaker statistics
    pub fn stats(&self) -> QueueResult<MatchmakerStats> {
        let mut stats = self
            .stats
            .read()
            .map_err(|_| MatchmakingError::lock_poisoned("matchmaker stats"))?
            .clone();
        stats.players_waiting = self.store.len()?;
        Ok(stats)
    }

    pub fn queue_len(&self) -> QueueResult<usize> {
        self.store.len()
    }

    /// Players currently waiting, in arrival order
    pub fn snapshot(&self) -> QueueResult<Vec<Player>> {
        self.store.snapshot()
    }

    pub fn config(&self) -> &MatchmakingConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<QueueStore> {
        &self.store
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics_collector
    }

    /// End the queue's lifecycle, returning everyone still waiting
    pub fn shutdown(&self) -> QueueResult<Vec<Player>> {
        let remaining = self.store.drain()?;
        self.update_stats(|stats| stats.players_waiting = 0);
        self.metrics_collector.set_queue_depth(0);

        info!(
            "Matchmaker shut down with {} players still waiting",
            remaining.len()
        );
        Ok(remaining)
    }

    fn update_stats(&self, update: impl FnOnce(&mut MatchmakerStats)) {
        match self.stats.write() {
            Ok(mut stats) => update(&mut stats),
            Err(_) => warn!("Matchmaker stats lock poisoned, skipping update"),
        }
    }
}
