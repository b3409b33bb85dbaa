//! High concurrency stress tests for the queue
//!
//! Enqueuers, cancelers and matchers run on a multi-threaded runtime against
//! one matchmaker. Afterwards every player must be accounted for exactly once.

use futures::future::join_all;
use skill_queue::{Match, PlayerId};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use crate::fixtures::{assert_valid_match, config, TestSystem};

const TEAM_SIZE: usize = 2;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_enqueue_cancel_and_match() {
    let system = Arc::new(TestSystem::new(config(TEAM_SIZE, 10_000.0, 0.0)));
    let players_per_task = 50;
    let enqueue_tasks = 8;

    let start_time = Instant::now();

    let enqueuers = (0..enqueue_tasks).map(|task| {
        let system = system.clone();
        tokio::spawn(async move {
            for i in 0..players_per_task {
                let id = format!("load_{}_{}", task, i);
                system
                    .matchmaker
                    .enqueue(id, 1000 + ((task * 37 + i * 13) % 500) as i64)
                    .expect("identities are unique");
                tokio::task::yield_now().await;
            }
        })
    });

    // Cancel every fifth player of each task; the player may already be
    // matched or not yet queued, both are fine.
    let cancelers = (0..enqueue_tasks).map(|task| {
        let system = system.clone();
        tokio::spawn(async move {
            let mut cancelled = Vec::new();
            for i in (0..players_per_task).step_by(5) {
                let id = format!("load_{}_{}", task, i);
                if let Ok(player) = system.matchmaker.cancel(&id) {
                    cancelled.push(player.id);
                }
                tokio::task::yield_now().await;
            }
            cancelled
        })
    });

    let matchers = (0..4).map(|_| {
        let system = system.clone();
        tokio::spawn(async move {
            let mut formed = Vec::new();
            for _ in 0..100 {
                if let Some(m) = system.matchmaker.try_match_default().await.unwrap() {
                    formed.push(m);
                }
                tokio::task::yield_now().await;
            }
            formed
        })
    });

    let (enqueued, cancelled, matched) = tokio::join!(
        join_all(enqueuers),
        join_all(cancelers),
        join_all(matchers)
    );
    for result in enqueued {
        result.unwrap();
    }

    let cancelled: Vec<PlayerId> = cancelled
        .into_iter()
        .flat_map(|r| r.unwrap())
        .collect();
    let mut matches: Vec<Match> = matched.into_iter().flat_map(|r| r.unwrap()).collect();

    // Whatever is left and fits forms now
    matches.extend(system.matchmaker.drain_matches().await.unwrap());

    let elapsed = start_time.elapsed();
    println!(
        "Processed {} players into {} matches in {:?}",
        enqueue_tasks * players_per_task,
        matches.len(),
        elapsed
    );

    let residual = system.queued_ids();
    let mut seen = HashSet::new();
    for m in &matches {
        assert_valid_match(m, TEAM_SIZE, &residual);
        for id in m.player_ids() {
            assert!(seen.insert(id.clone()), "{} matched twice", id);
        }
    }
    for id in cancelled.iter().chain(residual.iter()) {
        assert!(seen.insert(id.clone()), "{} accounted for twice", id);
    }

    assert_eq!(seen.len(), enqueue_tasks * players_per_task);
    // The tolerance admits any window, so at most a partial window remains
    assert!(residual.len() < TEAM_SIZE * 2);
    assert_eq!(
        system.publisher.event_count(),
        matches.len(),
        "every formed match is delivered once"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_competing_matchers_never_share_players() {
    let system = Arc::new(TestSystem::new(config(TEAM_SIZE, 50.0, 0.0)));
    for i in 0..200 {
        system
            .matchmaker
            .enqueue(format!("p{}", i), 1000 + (i % 40) * 5)
            .unwrap();
    }

    let matchers = (0..8).map(|_| {
        let system = system.clone();
        tokio::spawn(async move { system.matchmaker.drain_matches().await.unwrap() })
    });

    let mut matches: Vec<Match> = join_all(matchers)
        .await
        .into_iter()
        .flat_map(|r| r.unwrap())
        .collect();
    // A matcher that lost a claim stops its pass early
    matches.extend(system.matchmaker.drain_matches().await.unwrap());

    let mut seen = HashSet::new();
    for m in &matches {
        assert!(m.rating_spread <= 50);
        for id in m.player_ids() {
            assert!(seen.insert(id), "player claimed by two matches");
        }
    }
    assert_eq!(matches.len(), 50);
    assert!(system.queued_ids().is_empty());
}
