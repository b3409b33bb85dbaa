//! Match finder: snapshot, scan, claim
//!
//! The finder reads a snapshot from the queue store, runs the window search
//! without holding any lock, and then claims the accepted window through the
//! store's compare-and-remove. A claim that loses against a concurrent cancel
//! surfaces as `MatchRaceLost`; the queue is never left half-claimed.

use crate::error::{MatchmakingError, QueueResult};
use crate::matching::window::{find_window, sort_by_rating, split_teams, RangePolicy, WindowMatch};
use crate::queue::store::QueueStore;
use crate::types::{Match, Player};
use crate::utils::{current_timestamp, floor_average_rating, generate_match_id};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Validated parameters of one match search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchRequest {
    pub team_size: usize,
    pub policy: RangePolicy,
    window_len: usize,
}

impl MatchRequest {
    /// Validate the search parameters, rejecting a zero team size, a team
    /// size whose window length overflows, and negative or non-finite
    /// tolerances
    pub fn new(team_size: usize, base_range: f64, range_expansion: f64) -> QueueResult<Self> {
        if team_size == 0 {
            return Err(MatchmakingError::invalid_argument(
                "team_size must be greater than 0",
            ));
        }
        let window_len = team_size.checked_mul(2).ok_or_else(|| {
            MatchmakingError::invalid_argument(format!(
                "team_size {} is too large to form two teams",
                team_size
            ))
        })?;
        let policy = RangePolicy::new(base_range, range_expansion)?;
        Ok(Self {
            team_size,
            policy,
            window_len,
        })
    }

    /// Players needed for one match
    pub fn window_len(&self) -> usize {
        self.window_len
    }
}

/// An accepted window that has not been claimed yet
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    /// The window's players in ascending rating order
    pub players: Vec<Player>,
    pub window: WindowMatch,
    pub team_size: usize,
    /// The `now` the window was accepted at
    pub searched_at: Instant,
}

impl MatchCandidate {
    pub fn contains(&self, player_id: &str) -> bool {
        self.players.iter().any(|p| p.id == player_id)
    }
}

/// Runs the windowed search against a queue store
#[derive(Debug, Clone)]
pub struct MatchFinder {
    store: Arc<QueueStore>,
}

impl MatchFinder {
    pub fn new(store: Arc<QueueStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<QueueStore> {
        &self.store
    }

    /// Find and claim the first acceptable window at `now`
    ///
    /// Returns `Ok(None)` when fewer than `2 * team_size` players are queued
    /// or no window fits; the queue is unchanged in both cases.
    pub fn find_match(&self, request: &MatchRequest, now: Instant) -> QueueResult<Option<Match>> {
        match self.search(request, now)? {
            Some(candidate) => self.claim(candidate).map(Some),
            None => Ok(None),
        }
    }

    /// Scan a snapshot for the first acceptable window without touching the
    /// queue
    pub fn search(
        &self,
        request: &MatchRequest,
        now: Instant,
    ) -> QueueResult<Option<MatchCandidate>> {
        let window_len = request.window_len();

        if self.store.len()? < window_len {
            debug!(
                "Not enough players for team_size {} (need {})",
                request.team_size, window_len
            );
            return Ok(None);
        }

        let mut sorted = self.store.snapshot()?;
        if sorted.len() < window_len {
            return Ok(None);
        }
        sort_by_rating(&mut sorted);

        let Some(window) = find_window(&sorted, window_len, &request.policy, now) else {
            debug!(
                "No acceptable window among {} players (team_size: {}, base_range: {}, range_expansion: {})",
                sorted.len(),
                request.team_size,
                request.policy.base_range,
                request.policy.range_expansion
            );
            return Ok(None);
        };

        let players = sorted.drain(window.start..window.start + window_len).collect();
        Ok(Some(MatchCandidate {
            players,
            window,
            team_size: request.team_size,
            searched_at: now,
        }))
    }

    /// Claim a candidate's players and form the match
    ///
    /// Fails with `MatchRaceLost` when any candidate left the queue (or left
    /// and re-joined) since the search; nothing is removed in that case.
    pub fn claim(&self, candidate: MatchCandidate) -> QueueResult<Match> {
        self.store.claim(&candidate.players)?;

        let MatchCandidate {
            players,
            window,
            team_size,
            ..
        } = candidate;
        let (team1, team2) = split_teams(&players);
        let formed = Match {
            id: generate_match_id(),
            team1,
            team2,
            average_rating: floor_average_rating(&players),
            rating_spread: window.spread,
            created_at: current_timestamp(),
        };

        info!(
            "Match formed - match_id: {}, team_size: {}, average_rating: {}, spread: {}, allowed: {:.1}, longest_wait: {:.2}s",
            formed.id,
            team_size,
            formed.average_rating,
            window.spread,
            window.allowed,
            window.wait.as_secs_f64()
        );

        Ok(formed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::clock::{Clock, ManualClock};
    use crate::types::Rating;
    use std::time::Duration;

    fn setup(ratings: &[Rating]) -> (MatchFinder, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let store = Arc::new(QueueStore::with_clock(clock.clone()));
        for (i, rating) in ratings.iter().enumerate() {
            store.add(format!("p{}", i), *rating).unwrap();
        }
        (MatchFinder::new(store), clock)
    }

    fn team_ratings(team: &[crate::types::Player]) -> Vec<Rating> {
        team.iter().map(|p| p.rating).collect()
    }

    #[test]
    fn test_match_request_validation() {
        assert!(MatchRequest::new(5, 100.0, 10.0).is_ok());
        assert!(matches!(
            MatchRequest::new(0, 100.0, 10.0),
            Err(MatchmakingError::InvalidArgument { .. })
        ));
        assert!(matches!(
            MatchRequest::new(5, -1.0, 10.0),
            Err(MatchmakingError::InvalidArgument { .. })
        ));
        assert!(matches!(
            MatchRequest::new(5, 100.0, -10.0),
            Err(MatchmakingError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_match_request_rejects_overflowing_team_size() {
        assert!(matches!(
            MatchRequest::new(usize::MAX / 2 + 1, 100.0, 0.0),
            Err(MatchmakingError::InvalidArgument { .. })
        ));

        let largest = MatchRequest::new(usize::MAX / 2, 100.0, 0.0).unwrap();
        assert_eq!(largest.window_len(), usize::MAX - 1);

        // Too large for any queue, but a valid search
        let (finder, clock) = setup(&[1000, 1001]);
        assert!(finder.find_match(&largest, clock.now()).unwrap().is_none());
    }

    #[test]
    fn test_claim_after_cancel_loses_race() {
        let (finder, clock) = setup(&[1000, 1010, 1020, 1030, 1040, 1050]);
        let request = MatchRequest::new(2, 100.0, 0.0).unwrap();

        let candidate = finder.search(&request, clock.now()).unwrap().unwrap();
        assert!(candidate.contains("p0"));
        assert_eq!(finder.store().len().unwrap(), 6);

        finder.store().remove(&["p0".to_string()]).unwrap();

        assert!(matches!(
            finder.claim(candidate),
            Err(MatchmakingError::MatchRaceLost { ref player_id }) if player_id == "p0"
        ));
        assert_eq!(finder.store().len().unwrap(), 5);
        assert!(!finder.store().contains("p0").unwrap());
    }

    #[test]
    fn test_balanced_split_scenario() {
        let (finder, clock) = setup(&[1000, 1010, 1020, 1030, 1040, 1050]);
        let request = MatchRequest::new(3, 50.0, 0.0).unwrap();

        let formed = finder.find_match(&request, clock.now()).unwrap().unwrap();

        assert_eq!(team_ratings(&formed.team1), vec![1000, 1020, 1040]);
        assert_eq!(team_ratings(&formed.team2), vec![1010, 1030, 1050]);
        assert_eq!(formed.average_rating, 1025);
        assert_eq!(formed.rating_spread, 50);
        assert!(finder.store().is_empty().unwrap());
    }

    #[test]
    fn test_spread_too_wide_leaves_queue() {
        let (finder, clock) = setup(&[1000, 1010, 1020, 1030, 1040, 1050]);
        let request = MatchRequest::new(3, 20.0, 0.0).unwrap();

        let before = finder.store().snapshot().unwrap();
        assert!(finder.find_match(&request, clock.now()).unwrap().is_none());
        assert_eq!(finder.store().snapshot().unwrap(), before);
    }

    #[test]
    fn test_waiting_widens_tolerance() {
        let (finder, clock) = setup(&[1000, 1100]);
        let request = MatchRequest::new(1, 50.0, 10.0).unwrap();

        assert!(finder.find_match(&request, clock.now()).unwrap().is_none());

        clock.advance(Duration::from_secs(5));
        let formed = finder.find_match(&request, clock.now()).unwrap().unwrap();
        assert_eq!(formed.team_size(), 1);
        assert_eq!(formed.rating_spread, 100);
    }

    #[test]
    fn test_leaves_residual_players() {
        let (finder, clock) = setup(&[2000, 1000, 1005, 3000, 1010, 1015]);
        let request = MatchRequest::new(2, 20.0, 0.0).unwrap();

        let formed = finder.find_match(&request, clock.now()).unwrap().unwrap();
        let mut matched = formed.player_ids();
        matched.sort();
        assert_eq!(matched, vec!["p1", "p2", "p4", "p5"]);

        let residual: Vec<String> = finder
            .store()
            .snapshot()
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(residual, vec!["p0", "p3"]);
    }

    #[test]
    fn test_too_few_players() {
        let (finder, clock) = setup(&[1000, 1000, 1000]);
        let request = MatchRequest::new(2, 1000.0, 0.0).unwrap();
        assert!(finder.find_match(&request, clock.now()).unwrap().is_none());
        assert_eq!(finder.store().len().unwrap(), 3);
    }
}
