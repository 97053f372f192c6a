//! Optimistic vote coordination
//!
//! The coordinator is responsible for:
//! - Writing a vote into the cached post list before the request resolves
//! - Cancelling list fetches that could overwrite that write
//! - Committing (invalidate and refetch) or rolling back on settlement
//! - Raising transient notices for the UI

pub mod notice;
pub mod vote;

pub use notice::Notice;
pub use vote::{PendingVote, VoteCoordinator, VoteOutcome};
