//! Forum domain: posts, votes and the cached post list

pub mod feed;
pub mod post;

pub use feed::{posts_key, FeedRead, PostFeed, RefetchState, POSTS_KEY};
pub use post::{with_vote, Post, VoteDirection, VoterEntry, VoterId, Votes};
