//! Test doubles shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use fitforum::client::{ForumApi, VoteAck};
use fitforum::forum::{posts_key, Post, VoteDirection, VoterEntry, Votes};
use fitforum::{Error, QueryCache, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{oneshot, Notify};

const WAIT: Duration = Duration::from_secs(5);

/// A vote request the test has not answered yet
pub struct PendingCall {
    pub post_id: String,
    pub direction: VoteDirection,
    reply: oneshot::Sender<Result<VoteAck>>,
}

impl PendingCall {
    pub fn succeed(self) {
        let _ = self.reply.send(Ok(VoteAck::default()));
    }

    pub fn fail(self, status: u16, message: &str) {
        let _ = self.reply.send(Err(Error::from_status(status, message)));
    }
}

/// Forum backend whose vote responses are released by the test
#[derive(Default)]
pub struct ScriptedApi {
    server_posts: Mutex<Vec<Post>>,
    calls: Mutex<VecDeque<PendingCall>>,
    arrived: Notify,
    fetches: AtomicUsize,
    fetched: Notify,
}

impl ScriptedApi {
    pub fn new(server_posts: Vec<Post>) -> Arc<Self> {
        Arc::new(Self {
            server_posts: Mutex::new(server_posts),
            ..Default::default()
        })
    }

    /// Replace what `GET /forum` returns
    pub fn set_server_posts(&self, posts: Vec<Post>) {
        *self.server_posts.lock().unwrap() = posts;
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Next vote request, in arrival order
    pub async fn next_call(&self) -> PendingCall {
        tokio::time::timeout(WAIT, async {
            loop {
                if let Some(call) = self.calls.lock().unwrap().pop_front() {
                    return call;
                }
                self.arrived.notified().await;
            }
        })
        .await
        .expect("vote request never arrived")
    }

    /// Wait until `GET /forum` has been called at least `n` times
    pub async fn wait_for_fetches(&self, n: usize) {
        tokio::time::timeout(WAIT, async {
            while self.fetch_count() < n {
                self.fetched.notified().await;
            }
        })
        .await
        .expect("refetch never happened")
    }
}

#[async_trait]
impl ForumApi for ScriptedApi {
    async fn list_posts(&self) -> Result<Vec<Post>> {
        let posts = self.server_posts.lock().unwrap().clone();
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.fetched.notify_one();
        Ok(posts)
    }

    async fn vote(&self, post_id: &str, direction: VoteDirection) -> Result<VoteAck> {
        let (reply, rx) = oneshot::channel();
        self.calls.lock().unwrap().push_back(PendingCall {
            post_id: post_id.to_string(),
            direction,
            reply,
        });
        self.arrived.notify_one();
        rx.await
            .unwrap_or_else(|_| Err(Error::ConnectionFailed("request dropped".into())))
    }
}

pub fn post(id: &str, upvotes: u64, downvotes: u64, voters: &[(&str, VoteDirection)]) -> Post {
    let mut post = Post::new(id, format!("Post {}", id));
    post.category = "training".into();
    post.votes = Votes {
        upvotes,
        downvotes,
        voters: voters
            .iter()
            .map(|(email, direction)| VoterEntry {
                email: (*email).into(),
                vote_type: *direction,
            })
            .collect(),
    };
    post
}

pub fn cache_with(posts: Vec<Post>) -> Arc<QueryCache<Vec<Post>>> {
    let cache = Arc::new(QueryCache::new());
    cache.write(&posts_key(), posts);
    cache
}

pub fn cached_posts(cache: &QueryCache<Vec<Post>>) -> Vec<Post> {
    Vec::clone(&cache.read(&posts_key()).expect("post list cached").value)
}
