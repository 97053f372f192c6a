//! Forum backend client
//!
//! [`ForumApi`] is the seam between the coordinator and the REST backend;
//! [`HttpForumApi`] is the production implementation.

pub mod http;

use crate::common::Result;
use crate::forum::{Post, VoteDirection};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use http::HttpForumApi;

/// Body of `POST /forum/{id}/vote`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRequest {
    #[serde(rename = "voteType")]
    pub vote_type: VoteDirection,
}

/// Successful vote acknowledgement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoteAck {
    /// Updated post, when the backend echoes it
    pub post: Option<Post>,
    pub message: Option<String>,
}

#[async_trait]
pub trait ForumApi: Send + Sync {
    /// `GET /forum`
    async fn list_posts(&self) -> Result<Vec<Post>>;

    /// `POST /forum/{post_id}/vote`
    async fn vote(&self, post_id: &str, direction: VoteDirection) -> Result<VoteAck>;
}
