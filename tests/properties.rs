//! Property tests for the window search and match claiming

use proptest::prelude::*;
use skill_queue::matching::window::{find_window, sort_by_rating, RangePolicy};
use skill_queue::queue::{Clock, ManualClock, QueueStore};
use skill_queue::{MatchFinder, MatchRequest, Rating};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Build a store where player `i` joins `gaps[i]` seconds after player `i - 1`
fn build_store(ratings: &[Rating], gaps: &[u64]) -> (Arc<QueueStore>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let store = Arc::new(QueueStore::with_clock(clock.clone()));
    for (i, rating) in ratings.iter().enumerate() {
        clock.advance(Duration::from_secs(gaps.get(i).copied().unwrap_or(0)));
        store.add(format!("p{}", i), *rating).unwrap();
    }
    (store, clock)
}

fn queue_strategy() -> impl Strategy<Value = (Vec<Rating>, Vec<u64>)> {
    (1usize..24).prop_flat_map(|n| {
        (
            prop::collection::vec(0i64..3_000, n),
            prop::collection::vec(0u64..30, n),
        )
    })
}

proptest! {
    #[test]
    fn too_few_players_never_match(
        ratings in prop::collection::vec(any::<i64>(), 0..6),
        team_size in 3usize..6,
        base in 0.0f64..1e6,
    ) {
        let (store, clock) = build_store(&ratings, &[]);
        let before = store.snapshot().unwrap();
        let finder = MatchFinder::new(store.clone());
        let request = MatchRequest::new(team_size, base, 0.0).unwrap();

        prop_assert!(finder.find_match(&request, clock.now()).unwrap().is_none());
        prop_assert_eq!(store.snapshot().unwrap(), before);
    }

    #[test]
    fn formed_matches_are_balanced_and_disjoint(
        (ratings, gaps) in queue_strategy(),
        team_size in 1usize..4,
        base in 0.0f64..400.0,
        expansion in 0.0f64..20.0,
        extra_wait in 0u64..60,
    ) {
        let (store, clock) = build_store(&ratings, &gaps);
        clock.advance(Duration::from_secs(extra_wait));
        let finder = MatchFinder::new(store.clone());
        let request = MatchRequest::new(team_size, base, expansion).unwrap();
        let before = store.len().unwrap();

        if let Some(formed) = finder.find_match(&request, clock.now()).unwrap() {
            prop_assert_eq!(formed.team1.len(), team_size);
            prop_assert_eq!(formed.team2.len(), team_size);

            let ids: HashSet<_> = formed.player_ids().into_iter().collect();
            prop_assert_eq!(ids.len(), team_size * 2);
            for id in &ids {
                prop_assert!(!store.contains(id).unwrap());
            }
            prop_assert_eq!(store.len().unwrap(), before - team_size * 2);

            let all: Vec<Rating> = formed.players().map(|p| p.rating).collect();
            let max = *all.iter().max().unwrap();
            let min = *all.iter().min().unwrap();
            prop_assert_eq!(formed.rating_spread, max.abs_diff(min));

            let sum: i128 = all.iter().map(|r| *r as i128).sum();
            let floor = sum.div_euclid(all.len() as i128) as Rating;
            prop_assert_eq!(formed.average_rating, floor);

            let allowed = base + formed.longest_wait(clock.now()).as_secs_f64() * expansion;
            prop_assert!(RangePolicy::accepts(formed.rating_spread, allowed));
        } else {
            prop_assert_eq!(store.len().unwrap(), before);
        }
    }

    #[test]
    fn failed_search_is_repeatable(
        (ratings, gaps) in queue_strategy(),
        team_size in 1usize..4,
    ) {
        let (store, clock) = build_store(&ratings, &gaps);
        let finder = MatchFinder::new(store.clone());
        // Zero tolerance only accepts windows of identical ratings
        let request = MatchRequest::new(team_size, 0.0, 0.0).unwrap();
        let before = store.snapshot().unwrap();

        let first = finder.find_match(&request, clock.now()).unwrap();
        if first.is_none() {
            let second = finder.find_match(&request, clock.now()).unwrap();
            prop_assert!(second.is_none());
            prop_assert_eq!(store.snapshot().unwrap(), before);
        }
    }

    #[test]
    fn tolerance_only_widens_with_time(
        (ratings, gaps) in queue_strategy(),
        team_size in 1usize..4,
        base in 0.0f64..200.0,
        expansion in 0.0f64..20.0,
        later in 0u64..120,
    ) {
        let (store, clock) = build_store(&ratings, &gaps);
        let mut sorted = store.snapshot().unwrap();
        sort_by_rating(&mut sorted);
        let policy = RangePolicy::new(base, expansion).unwrap();

        let now = clock.now();
        let window_len = team_size * 2;
        if let Some(early) = find_window(&sorted, window_len, &policy, now) {
            let late = find_window(&sorted, window_len, &policy, now + Duration::from_secs(later));
            prop_assert!(late.is_some());
            // An earlier start can only appear, never disappear
            prop_assert!(late.unwrap().start <= early.start);
        }
    }
}
