//! Post list reads, background refetch and cancellation

mod common;

use common::{cache_with, cached_posts, post, ScriptedApi};
use fitforum::common::CounterPolicy;
use fitforum::forum::{posts_key, RefetchState, VoteDirection, VoterId};
use fitforum::{PostFeed, QueryCache, VoteCoordinator};
use std::sync::Arc;

#[tokio::test]
async fn test_first_read_fetches() {
    let server = vec![post("p1", 1, 0, &[]), post("p2", 0, 0, &[])];
    let api = ScriptedApi::new(server.clone());
    let cache = Arc::new(QueryCache::new());
    let feed = PostFeed::new(cache.clone(), api.clone());

    let first = feed.read();
    assert!(first.posts.is_none());
    assert_eq!(first.refetch, RefetchState::Scheduled);

    // Dedup: the spawned fetch has not run yet on this runtime
    assert_eq!(feed.read().refetch, RefetchState::InFlight);

    api.wait_for_fetches(1).await;
    let settled = feed.refresh().await.unwrap();
    assert_eq!(*settled, server);
    assert_eq!(feed.read().refetch, RefetchState::Fresh);
}

#[tokio::test]
async fn test_refetch_deferred_while_vote_pending() {
    let cache = cache_with(vec![post("p1", 3, 1, &[])]);
    let api = ScriptedApi::new(vec![post("p1", 3, 1, &[])]);
    let feed = PostFeed::new(cache.clone(), api.clone());
    let coord = VoteCoordinator::new(cache.clone(), api.clone(), CounterPolicy::default());

    let pending = coord.begin_vote(&VoterId::from("u1"), "p1", VoteDirection::Up);
    cache.invalidate(&posts_key());

    let read = feed.read();
    assert_eq!(read.refetch, RefetchState::Deferred);
    assert_eq!(read.posts.unwrap()[0].votes.upvotes, 4);

    // refresh() also leaves the optimistic value alone
    assert_eq!(feed.refresh().await.unwrap()[0].votes.upvotes, 4);
    assert_eq!(api.fetch_count(), 0);

    coord.settle(pending, Ok(Default::default()));
    assert_eq!(feed.read().refetch, RefetchState::Scheduled);
}

#[tokio::test]
async fn test_vote_cancels_scheduled_refetch() {
    let cache = cache_with(vec![post("p1", 3, 1, &[])]);
    cache.invalidate(&posts_key());
    let api = ScriptedApi::new(vec![post("p1", 3, 1, &[])]);
    let feed = PostFeed::new(cache.clone(), api.clone());
    let coord = VoteCoordinator::new(cache.clone(), api.clone(), CounterPolicy::default());

    assert_eq!(feed.read().refetch, RefetchState::Scheduled);
    assert!(cache.is_fetching(&posts_key()));

    let pending = coord.begin_vote(&VoterId::from("u1"), "p1", VoteDirection::Up);
    assert!(!cache.is_fetching(&posts_key()));

    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(cached_posts(&cache)[0].votes.upvotes, 4);
    assert_eq!(api.fetch_count(), 0);

    coord.settle(pending, Ok(Default::default()));
}

#[test]
fn test_stale_read_without_runtime() {
    let cache: Arc<QueryCache<Vec<fitforum::Post>>> = Arc::new(QueryCache::new());
    let feed = PostFeed::new(cache, ScriptedApi::new(vec![]));
    assert_eq!(feed.read().refetch, RefetchState::Unscheduled);
}
