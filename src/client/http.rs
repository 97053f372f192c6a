//! REST implementation of [`ForumApi`] over `reqwest`

use super::{ForumApi, VoteAck, VoteRequest};
use crate::common::{encode_segment, ApiConfig, Error, Result};
use crate::forum::{Post, VoteDirection};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;

/// `GET /forum` returns either a bare array or a wrapped one
#[derive(Deserialize)]
#[serde(untagged)]
enum PostListBody {
    Bare(Vec<Post>),
    Wrapped {
        #[serde(alias = "data")]
        posts: Vec<Post>,
    },
}

impl From<PostListBody> for Vec<Post> {
    fn from(body: PostListBody) -> Self {
        match body {
            PostListBody::Bare(posts) | PostListBody::Wrapped { posts } => posts,
        }
    }
}

pub struct HttpForumApi {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpForumApi {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn vote_url(&self, post_id: &str) -> String {
        format!("{}/forum/{}/vote", self.base_url, encode_segment(post_id))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::from_status(status.as_u16(), error_message(&body, status)))
    }
}

/// Server error text: `{"message": ...}` when present, raw body otherwise
fn error_message(body: &str, status: reqwest::StatusCode) -> String {
    let from_json = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string));
    match from_json {
        Some(message) => message,
        None if body.trim().is_empty() => status.to_string(),
        None => body.trim().to_string(),
    }
}

/// Read a 2xx vote response. Any body is accepted as acknowledgement.
fn parse_vote_ack(body: &str) -> VoteAck {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        let text = body.trim();
        return VoteAck {
            post: None,
            message: (!text.is_empty()).then(|| text.to_string()),
        };
    };

    let message = value
        .get("message")
        .and_then(|m| m.as_str())
        .map(str::to_string);
    let post_value = if value.get("_id").is_some() {
        Some(&value)
    } else {
        value
            .get("post")
            .or_else(|| value.get("data"))
            .filter(|v| v.get("_id").is_some())
    };
    let post = post_value.and_then(|v| match Post::deserialize(v) {
        Ok(post) => Some(post),
        Err(e) => {
            tracing::debug!("Ignoring unreadable post in vote response: {}", e);
            None
        }
    });

    VoteAck { post, message }
}

#[async_trait]
impl ForumApi for HttpForumApi {
    async fn list_posts(&self) -> Result<Vec<Post>> {
        let url = format!("{}/forum", self.base_url);
        tracing::debug!(url = %url, "Fetching forum posts");

        let response = self.authorize(self.client.get(&url)).send().await?;
        let response = Self::check(response).await?;
        let body: PostListBody = response.json().await?;
        Ok(body.into())
    }

    async fn vote(&self, post_id: &str, direction: VoteDirection) -> Result<VoteAck> {
        let url = self.vote_url(post_id);
        tracing::debug!(url = %url, direction = %direction, "Sending vote");

        let response = self
            .authorize(self.client.post(&url))
            .json(&VoteRequest {
                vote_type: direction,
            })
            .send()
            .await?;
        let response = Self::check(response).await?;
        let body = response.text().await?;
        Ok(parse_vote_ack(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_url_encodes_id() {
        let api = HttpForumApi::new(&ApiConfig {
            base_url: "http://localhost:5000/api/".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(api.base_url(), "http://localhost:5000/api");
        assert_eq!(
            api.vote_url("p 1/x"),
            "http://localhost:5000/api/forum/p%201%2Fx/vote"
        );
    }

    #[test]
    fn test_vote_request_body() {
        let body = serde_json::to_string(&VoteRequest {
            vote_type: VoteDirection::Down,
        })
        .unwrap();
        assert_eq!(body, r#"{"voteType":"down"}"#);
    }

    #[test]
    fn test_parse_vote_ack() {
        let ack = parse_vote_ack(r#"{"message":"Vote recorded","post":{"_id":"p1","votes":{"upvotes":4}}}"#);
        assert_eq!(ack.message.as_deref(), Some("Vote recorded"));
        assert_eq!(ack.post.unwrap().votes.upvotes, 4);

        let bare = parse_vote_ack(r#"{"_id":"p1"}"#);
        assert_eq!(bare.post.unwrap().id, "p1");

        let text = parse_vote_ack("OK");
        assert_eq!(text.message.as_deref(), Some("OK"));
        assert_eq!(parse_vote_ack(""), VoteAck::default());
    }

    #[test]
    fn test_error_message() {
        let status = reqwest::StatusCode::CONFLICT;
        assert_eq!(error_message(r#"{"message":"already voted"}"#, status), "already voted");
        assert_eq!(error_message("plain", status), "plain");
        assert_eq!(error_message("", status), "409 Conflict");
    }

    #[test]
    fn test_post_list_shapes() {
        let bare: PostListBody = serde_json::from_str(r#"[{"_id":"p1"}]"#).unwrap();
        assert_eq!(Vec::<Post>::from(bare).len(), 1);
        let wrapped: PostListBody = serde_json::from_str(r#"{"data":[{"_id":"p1"},{"_id":"p2"}]}"#).unwrap();
        assert_eq!(Vec::<Post>::from(wrapped).len(), 2);
    }
}
