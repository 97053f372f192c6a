//! Client-side request cache
//!
//! Holds fetched server state by key and provides the primitives the vote
//! coordinator builds on:
//! - versioned writes visible to every later read
//! - invalidation that makes the next subscriber read refetch
//! - in-flight fetch cancellation and dedup
//! - optimistic writes with snapshot rollback

pub mod store;

pub use store::{
    CacheEvent, CachedValue, FetchDecision, FetchTicket, OptimisticWrite, QueryCache, QueryKey,
    RollbackOutcome,
};
