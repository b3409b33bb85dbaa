//! Queue store holding waiting players
//!
//! The store is a map from identity to [`Player`] behind a single
//! `RwLock`. Snapshots clone under a read lock and are sorted afterwards, so
//! searches never hold the lock while scoring. Every mutation is a bounded
//! critical section under the write lock, which also serializes competing
//! batch removals: two searches can never both claim the same player.

use crate::error::{MatchmakingError, QueueResult};
use crate::queue::clock::{Clock, SystemClock};
use crate::types::{Player, PlayerId, Rating};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use tracing::debug;

#[derive(Debug, Default)]
struct QueueState {
    players: HashMap<PlayerId, Player>,
    next_ticket: u64,
}

/// Thread-safe store of queued players
#[derive(Debug)]
pub struct QueueStore {
    state: RwLock<QueueState>,
    clock: Arc<dyn Clock>,
}

impl QueueStore {
    /// Create an empty store stamping players with the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store stamping players with `clock`
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(QueueState::default()),
            clock,
        }
    }

    /// The clock used for enqueue stamps
    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// Insert a player, stamping the enqueue time now
    pub fn add(&self, player_id: impl Into<PlayerId>, rating: Rating) -> QueueResult<Player> {
        let player_id = player_id.into();
        if player_id.is_empty() {
            return Err(MatchmakingError::invalid_argument(
                "player_id cannot be empty",
            ));
        }

        let mut state = self.write()?;
        if state.players.contains_key(&player_id) {
            return Err(MatchmakingError::DuplicateIdentity { player_id });
        }

        let ticket = state.next_ticket;
        state.next_ticket += 1;

        let player = Player::queued(player_id.clone(), rating, self.clock.now(), ticket);
        state.players.insert(player_id, player.clone());

        debug!(
            "Player queued - player_id: '{}', rating: {}, ticket: {}, queue_size: {}",
            player.id,
            player.rating,
            ticket,
            state.players.len()
        );
        Ok(player)
    }

    /// Remove a batch of players by identity, all or nothing
    ///
    /// Fails with `NotFound` naming the first identity that is absent (or
    /// repeated within the batch); the queue is untouched in that case.
    pub fn remove(&self, player_ids: &[PlayerId]) -> QueueResult<Vec<Player>> {
        let mut state = self.write()?;

        let mut seen = HashSet::with_capacity(player_ids.len());
        for player_id in player_ids {
            if !seen.insert(player_id.as_str()) || !state.players.contains_key(player_id) {
                return Err(MatchmakingError::NotFound {
                    player_id: player_id.clone(),
                });
            }
        }

        let removed: Vec<Player> = player_ids
            .iter()
            .filter_map(|id| state.players.remove(id))
            .collect();

        debug!(
            "Removed {} players, queue_size: {}",
            removed.len(),
            state.players.len()
        );
        Ok(removed)
    }

    /// Compare-and-remove the exact memberships in `candidates`
    ///
    /// Every candidate must still be queued under the same ticket it had in
    /// the snapshot. A player who left (or left and re-joined) makes the whole
    /// claim fail with `MatchRaceLost` and nothing is removed.
    pub fn claim(&self, candidates: &[Player]) -> QueueResult<Vec<Player>> {
        let mut state = self.write()?;

        let mut seen = HashSet::with_capacity(candidates.len());
        for candidate in candidates {
            let current_ticket = state.players.get(&candidate.id).map(Player::ticket);
            if !seen.insert(candidate.id.as_str()) || current_ticket != Some(candidate.ticket()) {
                return Err(MatchmakingError::MatchRaceLost {
                    player_id: candidate.id.clone(),
                });
            }
        }

        let claimed: Vec<Player> = candidates
            .iter()
            .filter_map(|c| state.players.remove(&c.id))
            .collect();

        debug!(
            "Claimed {} players, queue_size: {}",
            claimed.len(),
            state.players.len()
        );
        Ok(claimed)
    }

    /// Copy of all queued players in insertion order
    pub fn snapshot(&self) -> QueueResult<Vec<Player>> {
        let mut players: Vec<Player> = {
            let state = self.read()?;
            state.players.values().cloned().collect()
        };
        players.sort_unstable_by_key(Player::ticket);
        Ok(players)
    }

    pub fn get(&self, player_id: &str) -> QueueResult<Option<Player>> {
        Ok(self.read()?.players.get(player_id).cloned())
    }

    pub fn contains(&self, player_id: &str) -> QueueResult<bool> {
        Ok(self.read()?.players.contains_key(player_id))
    }

    pub fn len(&self) -> QueueResult<usize> {
        Ok(self.read()?.players.len())
    }

    pub fn is_empty(&self) -> QueueResult<bool> {
        Ok(self.read()?.players.is_empty())
    }

    /// Remove and return every queued player, in insertion order
    pub fn drain(&self) -> QueueResult<Vec<Player>> {
        let mut players: Vec<Player> = {
            let mut state = self.write()?;
            state.players.drain().map(|(_, p)| p).collect()
        };
        players.sort_unstable_by_key(Player::ticket);
        Ok(players)
    }

    fn read(&self) -> QueueResult<std::sync::RwLockReadGuard<'_, QueueState>> {
        self.state
            .read()
            .map_err(|_| MatchmakingError::lock_poisoned("queue"))
    }

    fn write(&self) -> QueueResult<std::sync::RwLockWriteGuard<'_, QueueState>> {
        self.state
            .write()
            .map_err(|_| MatchmakingError::lock_poisoned("queue"))
    }
}

impl Default for QueueStore {
    fn default() -> Self {
        Self::new()
    }
}
