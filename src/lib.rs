//! # fitforum
//!
//! Client library for the fitness platform's forum with:
//! - A keyed request cache with invalidation and in-flight fetch cancellation
//! - Optimistic upvote/downvote with exact rollback on failure
//! - A `reqwest` client for the forum REST API
//! - Session-scoped voter identity
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐  apply_vote   ┌──────────────────┐  POST /forum/{id}/vote
//! │  Session   │──────────────▶│  VoteCoordinator │──────────────────────┐
//! │ (voter id) │               └────────┬─────────┘                      │
//! └────────────┘     snapshot / write / │ rollback / invalidate          ▼
//!                              ┌────────▼─────────┐              ┌──────────────┐
//!        PostFeed::read ──────▶│    QueryCache    │◀─── refetch ─│ HttpForumApi │
//!                              │  forum/posts     │   GET /forum └──────────────┘
//!                              └──────────────────┘
//! ```
//!
//! ## Usage
//!
//! ### List posts
//! ```bash
//! fitforum --api http://localhost:5000 posts
//! ```
//!
//! ### Vote
//! ```bash
//! fitforum vote 65f1c0ffee up --voter member@gym.io
//! ```

pub mod cache;
pub mod client;
pub mod common;
pub mod coordinator;
pub mod forum;
pub mod session;

// Re-export commonly used types
pub use cache::{QueryCache, QueryKey};
pub use client::{ForumApi, HttpForumApi, VoteAck};
pub use common::{Config, Error, Result};
pub use coordinator::{Notice, VoteCoordinator, VoteOutcome};
pub use forum::{Post, PostFeed, VoteDirection, VoterId};
pub use session::Session;

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build info
pub const BUILD_INFO: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CARGO_PKG_NAME"), ")");
