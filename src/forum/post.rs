//! Forum post model and the vote mutation applied to it
//!
//! The JSON shape mirrors the backend: posts are keyed by `_id` and carry a
//! `votes` object with counters plus one `{ email, voteType }` entry per voter.

use crate::common::CounterPolicy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction of a vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteDirection::Up => "up",
            VoteDirection::Down => "down",
        }
    }
}

impl fmt::Display for VoteDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoteDirection {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" | "upvote" => Ok(VoteDirection::Up),
            "down" | "downvote" => Ok(VoteDirection::Down),
            other => Err(crate::Error::Other(format!(
                "unknown vote direction: {}",
                other
            ))),
        }
    }
}

/// Identity of a voter (the member's email on this platform)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoterId(String);

impl VoterId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VoterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VoterId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One member's current vote on a post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterEntry {
    pub email: VoterId,
    #[serde(rename = "voteType")]
    pub vote_type: VoteDirection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Votes {
    #[serde(default)]
    pub upvotes: u64,
    #[serde(default)]
    pub downvotes: u64,
    #[serde(default)]
    pub voters: Vec<VoterEntry>,
}

impl Votes {
    /// The voter's current choice, if any
    pub fn choice_of(&self, voter: &VoterId) -> Option<VoteDirection> {
        self.voters
            .iter()
            .find(|entry| &entry.email == voter)
            .map(|entry| entry.vote_type)
    }

    /// Net score (upvotes minus downvotes)
    pub fn score(&self) -> i64 {
        self.upvotes as i64 - self.downvotes as i64
    }

    /// Record `voter`'s choice, replacing any earlier entry of theirs.
    ///
    /// Repeating the current choice changes nothing. Under
    /// [`CounterPolicy::IncrementOnly`] a switch bumps the new counter and
    /// leaves the old one as is; [`CounterPolicy::Symmetric`] also takes the
    /// previous vote back out of its counter.
    pub fn apply(&mut self, voter: &VoterId, direction: VoteDirection, policy: CounterPolicy) {
        let previous = self.choice_of(voter);
        if previous == Some(direction) {
            return;
        }

        self.voters.retain(|entry| &entry.email != voter);
        self.voters.push(VoterEntry {
            email: voter.clone(),
            vote_type: direction,
        });

        match direction {
            VoteDirection::Up => self.upvotes += 1,
            VoteDirection::Down => self.downvotes += 1,
        }

        if policy == CounterPolicy::Symmetric {
            match previous {
                Some(VoteDirection::Up) => self.upvotes = self.upvotes.saturating_sub(1),
                Some(VoteDirection::Down) => self.downvotes = self.downvotes.saturating_sub(1),
                None => {}
            }
        }
    }
}

/// A forum entry as served by `GET /forum`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_read_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub votes: Votes,
}

impl Post {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            category: String::new(),
            tags: Vec::new(),
            difficulty: None,
            estimated_read_time: None,
            author_role: None,
            created_at: None,
            votes: Votes::default(),
        }
    }
}

/// Copy of `posts` with `voter`'s vote applied to `post_id` only.
///
/// Returns the list unchanged when `post_id` is not present.
pub fn with_vote(
    posts: &[Post],
    post_id: &str,
    voter: &VoterId,
    direction: VoteDirection,
    policy: CounterPolicy,
) -> Vec<Post> {
    posts
        .iter()
        .map(|post| {
            if post.id == post_id {
                let mut post = post.clone();
                post.votes.apply(voter, direction, policy);
                post
            } else {
                post.clone()
            }
        })
        .collect()
}
