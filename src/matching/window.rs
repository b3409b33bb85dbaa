//! Windowed search over a rating-sorted snapshot
//!
//! A window is a run of `2 * team_size` consecutive players after sorting by
//! rating. It is acceptable when its rating spread fits the tolerance, which
//! grows linearly with the longest wait in the window. The first acceptable
//! window from the low end wins.

use crate::error::{MatchmakingError, QueueResult};
use crate::types::{Player, RatingSpread};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Skill-spread tolerance that widens with waiting time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangePolicy {
    /// Spread accepted with no wait
    pub base_range: f64,
    /// Extra spread accepted per second waited
    pub range_expansion: f64,
}

impl RangePolicy {
    pub fn new(base_range: f64, range_expansion: f64) -> QueueResult<Self> {
        let policy = Self {
            base_range,
            range_expansion,
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> QueueResult<()> {
        if !self.base_range.is_finite() || self.base_range < 0.0 {
            return Err(MatchmakingError::invalid_argument(format!(
                "base_range must be a non-negative number, got {}",
                self.base_range
            )));
        }
        if !self.range_expansion.is_finite() || self.range_expansion < 0.0 {
            return Err(MatchmakingError::invalid_argument(format!(
                "range_expansion must be a non-negative number, got {}",
                self.range_expansion
            )));
        }
        Ok(())
    }

    /// Largest spread accepted after waiting `wait`
    pub fn allowed_spread(&self, wait: Duration) -> f64 {
        self.base_range + wait.as_secs_f64() * self.range_expansion
    }

    /// Whether `spread` fits within `allowed`, compared without rounding
    /// the spread through `f64`
    pub fn accepts(spread: RatingSpread, allowed: f64) -> bool {
        // 2^64, the first f64 above every u64
        const SPREAD_LIMIT: f64 = 18_446_744_073_709_551_616.0;

        if allowed.is_nan() || allowed < 0.0 {
            return false;
        }
        if allowed >= SPREAD_LIMIT {
            return true;
        }
        // An integer spread fits iff it fits the integral part; the floor of
        // a finite f64 below 2^64 converts to u64 exactly
        spread <= allowed.floor() as u64
    }
}

impl Default for RangePolicy {
    fn default() -> Self {
        Self {
            base_range: 100.0,
            range_expansion: 10.0,
        }
    }
}

/// An accepted window within a sorted slice
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowMatch {
    /// Index of the lowest-rated player of the window
    pub start: usize,
    pub spread: RatingSpread,
    /// Longest wait in the window
    pub wait: Duration,
    pub allowed: f64,
}

/// Stable ascending sort by rating; ties keep their incoming order
pub fn sort_by_rating(players: &mut [Player]) {
    players.sort_by_key(|p| p.rating);
}

/// Rating spread of an already sorted window
///
/// Exact over the whole `i64` range.
pub fn window_spread(window: &[Player]) -> RatingSpread {
    match (window.first(), window.last()) {
        (Some(low), Some(high)) => high.rating.abs_diff(low.rating),
        _ => 0,
    }
}

/// Scan windows of `window_len` from index 0 upward and return the first one
/// whose spread fits `policy` at `now`
pub fn find_window(
    sorted: &[Player],
    window_len: usize,
    policy: &RangePolicy,
    now: Instant,
) -> Option<WindowMatch> {
    if window_len == 0 || sorted.len() < window_len {
        return None;
    }

    sorted
        .windows(window_len)
        .enumerate()
        .find_map(|(start, window)| {
            let spread = window_spread(window);
            let wait = window
                .iter()
                .map(|p| p.wait_time(now))
                .max()
                .unwrap_or_default();
            let allowed = policy.allowed_spread(wait);

            RangePolicy::accepts(spread, allowed).then_some(WindowMatch {
                start,
                spread,
                wait,
                allowed,
            })
        })
}

/// Alternate ranks between the teams: 0, 2, 4, ... and 1, 3, 5, ...
pub fn split_teams(window: &[Player]) -> (Vec<Player>, Vec<Player>) {
    let team1 = window.iter().step_by(2).cloned().collect();
    let team2 = window.iter().skip(1).step_by(2).cloned().collect();
    (team1, team2)
}
