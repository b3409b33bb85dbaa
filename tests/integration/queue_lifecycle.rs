//! Queue lifecycle tests: membership, cancellation and claim races

use skill_queue::queue::QueueStore;
use skill_queue::{Clock, ManualClock, MatchRequest, MatchFinder, MatchmakingError};
use std::sync::Arc;
use std::time::Duration;

use crate::fixtures::{assert_valid_match, config, TestSystem};

#[tokio::test]
async fn test_enqueue_rejects_duplicates_and_blank_ids() {
    let system = TestSystem::new(config(1, 100.0, 0.0));
    system.matchmaker.enqueue("alice", 1500).unwrap();

    let dup = system.matchmaker.enqueue("alice", 1700).unwrap_err();
    assert!(matches!(dup, MatchmakingError::DuplicateIdentity { .. }));

    let blank = system.matchmaker.enqueue("", 1500).unwrap_err();
    assert!(matches!(blank, MatchmakingError::InvalidArgument { .. }));

    // Original rating kept
    let queued = system.matchmaker.snapshot().unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].rating, 1500);
}

#[tokio::test]
async fn test_cancel_unknown_player() {
    let system = TestSystem::new(config(1, 100.0, 0.0));
    let err = system.matchmaker.cancel("ghost").unwrap_err();
    assert!(matches!(err, MatchmakingError::NotFound { .. }));
    assert_eq!(system.matchmaker.stats().unwrap().players_cancelled, 0);
}

#[tokio::test]
async fn test_cancel_then_reenqueue_starts_fresh_wait() {
    let system = TestSystem::new(config(1, 0.0, 10.0));
    system.enqueue_all(&[("alice", 1000), ("bob", 1100)]);

    system.clock.advance(Duration::from_secs(20));
    let cancelled = system.matchmaker.cancel("alice").unwrap();
    assert_eq!(cancelled.wait_time(system.clock.now()), Duration::from_secs(20));

    let rejoined = system.matchmaker.enqueue("alice", 1000).unwrap();
    assert!(rejoined.ticket() > cancelled.ticket());
    assert_eq!(rejoined.wait_time(system.clock.now()), Duration::ZERO);

    // Bob has waited 20s and would accept spread 200, but the window's wait
    // is the longest in it, so alice's reset does not hold him back.
    let formed = system.matchmaker.try_match_default().await.unwrap().unwrap();
    assert_valid_match(&formed, 1, &system.queued_ids());
    assert_eq!(formed.rating_spread, 100);
}

#[tokio::test]
async fn test_players_too_few_for_a_match() {
    let system = TestSystem::new(config(2, 1_000.0, 0.0));
    system.enqueue_all(&[("a", 1000), ("b", 1001), ("c", 1002)]);

    assert!(system.matchmaker.try_match_default().await.unwrap().is_none());
    assert_eq!(system.queued_ids(), vec!["a", "b", "c"]);
    assert_eq!(system.publisher.event_count(), 0);
}

#[tokio::test]
async fn test_drain_forms_every_fitting_match() {
    let system = TestSystem::new(config(1, 10.0, 0.0));
    system.enqueue_all(&[
        ("a", 1000),
        ("b", 1005),
        ("c", 2000),
        ("d", 2010),
        ("e", 3000),
    ]);

    let formed = system.matchmaker.drain_matches().await.unwrap();
    assert_eq!(formed.len(), 2);
    assert_eq!(system.queued_ids(), vec!["e"]);
    assert_eq!(system.publisher.event_count(), 2);

    let stats = system.matchmaker.stats().unwrap();
    assert_eq!(stats.matches_formed, 2);
    assert_eq!(stats.players_matched, 4);
    assert_eq!(stats.players_waiting, 1);
}

#[test]
fn test_claim_fails_when_candidate_left() {
    let clock = Arc::new(ManualClock::new());
    let store = QueueStore::with_clock(clock);
    store.add("a", 1000).unwrap();
    store.add("b", 1010).unwrap();
    store.add("c", 1020).unwrap();

    let snapshot = store.snapshot().unwrap();
    store.remove(&["b".to_string()]).unwrap();

    let err = store.claim(&snapshot[..2]).unwrap_err();
    assert!(matches!(err, MatchmakingError::MatchRaceLost { ref player_id } if player_id == "b"));
    // Nothing was taken
    assert_eq!(store.len().unwrap(), 2);
    assert!(store.contains("a").unwrap());
}

#[test]
fn test_claim_fails_when_candidate_rejoined() {
    let store = QueueStore::new();
    store.add("a", 1000).unwrap();
    store.add("b", 1010).unwrap();

    let snapshot = store.snapshot().unwrap();
    store.remove(&["a".to_string()]).unwrap();
    store.add("a", 1000).unwrap();

    let err = store.claim(&snapshot).unwrap_err();
    assert!(matches!(err, MatchmakingError::MatchRaceLost { .. }));
    assert_eq!(store.len().unwrap(), 2);
}

#[test]
fn test_finder_claims_players_once() {
    let store = Arc::new(QueueStore::new());
    store.add("a", 1000).unwrap();
    store.add("b", 1001).unwrap();
    let finder = MatchFinder::new(store.clone());
    let request = MatchRequest::new(1, 10.0, 0.0).unwrap();

    let formed = finder.find_match(&request, store.clock().now()).unwrap();
    assert!(formed.is_some());
    assert!(store.is_empty().unwrap());

    // A second search over an empty queue finds nothing
    assert!(finder
        .find_match(&request, store.clock().now())
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_shutdown_returns_waiting_players() {
    let system = TestSystem::new(config(2, 0.0, 0.0));
    system.enqueue_all(&[("a", 1000), ("b", 2000)]);

    let remaining = system.matchmaker.shutdown().unwrap();
    let mut ids: Vec<_> = remaining.into_iter().map(|p| p.id).collect();
    ids.sort();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(system.matchmaker.queue_len().unwrap(), 0);
}
