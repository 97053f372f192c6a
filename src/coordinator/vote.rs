//! Optimistic vote coordinator
//!
//! A vote is written into the cached post list before the request goes out.
//! When the request settles the write is either committed (the list is
//! invalidated so the server's numbers are refetched) or rolled back to the
//! snapshot taken just before it.
//!
//! ```text
//!  Settled ──begin_vote──▶ Pending(optimistic, snapshot)
//!                              │
//!              ok ◀────────────┴────────────▶ err
//!               │                              │
//!   invalidate + refetch              restore snapshot
//!               ▼                              ▼
//!        Settled(server)               Settled(snapshot)
//! ```

use crate::cache::{OptimisticWrite, QueryCache, QueryKey, RollbackOutcome};
use crate::client::{ForumApi, VoteAck};
use crate::common::{generate_mutation_id, CounterPolicy, Error, Result, VoteConfig};
use crate::coordinator::Notice;
use crate::forum::{posts_key, with_vote, Post, VoteDirection, VoterId};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// How a vote settled
#[derive(Debug)]
pub enum VoteOutcome {
    /// Server accepted; list invalidated for refetch
    Committed { ack: VoteAck },
    /// Server rejected; cache restored to the pre-vote snapshot
    RolledBack { error: Error },
    /// Server rejected, but a later vote already rewrote the list; that
    /// write is kept and the list is refetched once no vote is pending
    Superseded { error: Error },
}

impl VoteOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, VoteOutcome::Committed { .. })
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            VoteOutcome::Committed { .. } => None,
            VoteOutcome::RolledBack { error } | VoteOutcome::Superseded { error } => Some(error),
        }
    }
}

/// A vote whose optimistic write is in the cache and whose request has not settled.
///
/// Dropping it unsettled rolls the write back.
pub struct PendingVote {
    mutation_id: String,
    post_id: String,
    direction: VoteDirection,
    cache: Arc<QueryCache<Vec<Post>>>,
    write: Option<OptimisticWrite<Vec<Post>>>,
}

impl PendingVote {
    pub fn mutation_id(&self) -> &str {
        &self.mutation_id
    }

    pub fn post_id(&self) -> &str {
        &self.post_id
    }

    pub fn direction(&self) -> VoteDirection {
        self.direction
    }

    /// Whether the optimistic step changed the cache
    pub fn wrote(&self) -> bool {
        self.write.as_ref().map_or(false, |w| w.wrote())
    }

    /// List as it was before this vote
    pub fn snapshot(&self) -> Option<&Arc<Vec<Post>>> {
        self.write.as_ref().and_then(|w| w.snapshot())
    }
}

impl Drop for PendingVote {
    fn drop(&mut self) {
        if let Some(write) = self.write.take() {
            tracing::warn!(
                mutation_id = %self.mutation_id,
                post_id = %self.post_id,
                "Vote abandoned before settling, rolling back"
            );
            self.cache.rollback_optimistic(write);
        }
    }
}

pub struct VoteCoordinator {
    cache: Arc<QueryCache<Vec<Post>>>,
    api: Arc<dyn ForumApi>,
    key: QueryKey,
    policy: CounterPolicy,
    notices: broadcast::Sender<Notice>,
}

impl VoteCoordinator {
    pub fn new(
        cache: Arc<QueryCache<Vec<Post>>>,
        api: Arc<dyn ForumApi>,
        policy: CounterPolicy,
    ) -> Self {
        let (notices, _) = broadcast::channel(32);
        Self {
            cache,
            api,
            key: posts_key(),
            policy,
            notices,
        }
    }

    pub fn from_config(
        cache: Arc<QueryCache<Vec<Post>>>,
        api: Arc<dyn ForumApi>,
        config: &VoteConfig,
    ) -> Self {
        Self::new(cache, api, config.counter_policy)
    }

    pub fn policy(&self) -> CounterPolicy {
        self.policy
    }

    pub fn cache(&self) -> &Arc<QueryCache<Vec<Post>>> {
        &self.cache
    }

    /// Vote outcome notifications for the UI
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    /// Cancel list fetches, snapshot the list and write the optimistic vote.
    ///
    /// Runs to completion without yielding. A post missing from the list
    /// leaves the cache untouched; the request is still expected to be sent.
    pub fn begin_vote(
        &self,
        voter: &VoterId,
        post_id: &str,
        direction: VoteDirection,
    ) -> PendingVote {
        let mutation_id = generate_mutation_id();
        let policy = self.policy;

        let write = self.cache.begin_optimistic(&self.key, |current| {
            let posts = current?;
            if !posts.iter().any(|p| p.id == post_id) {
                return None;
            }
            Some(with_vote(posts, post_id, voter, direction, policy))
        });

        if write.wrote() {
            tracing::debug!(
                mutation_id = %mutation_id,
                post_id = %post_id,
                voter = %voter,
                direction = %direction,
                "Optimistic vote written"
            );
        } else {
            tracing::debug!(
                mutation_id = %mutation_id,
                post_id = %post_id,
                "Post not cached, sending vote without optimistic write"
            );
        }

        PendingVote {
            mutation_id,
            post_id: post_id.to_string(),
            direction,
            cache: self.cache.clone(),
            write: Some(write),
        }
    }

    /// Commit or roll back `pending` according to the request result
    pub fn settle(&self, mut pending: PendingVote, result: Result<VoteAck>) -> VoteOutcome {
        let Some(write) = pending.write.take() else {
            return VoteOutcome::RolledBack {
                error: Error::Internal("vote already settled".into()),
            };
        };

        match result {
            Ok(ack) => {
                self.cache.commit_optimistic(write);
                tracing::info!(
                    mutation_id = %pending.mutation_id,
                    post_id = %pending.post_id,
                    direction = %pending.direction,
                    "Vote recorded"
                );
                self.notify(Notice::VoteRecorded {
                    post_id: pending.post_id.clone(),
                    direction: pending.direction,
                });
                VoteOutcome::Committed { ack }
            }
            Err(error) => {
                let rollback = self.cache.rollback_optimistic(write);
                tracing::warn!(
                    mutation_id = %pending.mutation_id,
                    post_id = %pending.post_id,
                    direction = %pending.direction,
                    rollback = ?rollback,
                    "Vote failed: {}",
                    error
                );
                self.notify(Notice::VoteFailed {
                    post_id: pending.post_id.clone(),
                    direction: pending.direction,
                    reason: error.to_string(),
                });
                match rollback {
                    RollbackOutcome::Superseded => VoteOutcome::Superseded { error },
                    RollbackOutcome::Restored
                    | RollbackOutcome::Unchanged
                    | RollbackOutcome::Evicted => {
                        VoteOutcome::RolledBack { error }
                    }
                }
            }
        }
    }

    /// Optimistic write, request, then commit or rollback.
    ///
    /// The cache is written on the first poll, before the request is sent.
    pub async fn apply_vote(
        &self,
        voter: &VoterId,
        post_id: &str,
        direction: VoteDirection,
    ) -> VoteOutcome {
        let pending = self.begin_vote(voter, post_id, direction);
        let span = tracing::info_span!("vote", mutation_id = %pending.mutation_id());
        let result = self
            .api
            .vote(post_id, direction)
            .instrument(span)
            .await;
        self.settle(pending, result)
    }

    /// Write the optimistic vote now and settle it on a background task.
    ///
    /// The cache already shows the vote when this returns. Must be called
    /// from within a Tokio runtime.
    pub fn spawn_vote(
        self: &Arc<Self>,
        voter: &VoterId,
        post_id: impl Into<String>,
        direction: VoteDirection,
    ) -> JoinHandle<VoteOutcome> {
        let post_id = post_id.into();
        let pending = self.begin_vote(voter, &post_id, direction);
        let span = tracing::info_span!("vote", mutation_id = %pending.mutation_id());
        let this = Arc::clone(self);

        tokio::spawn(
            async move {
                let result = this.api.vote(&post_id, direction).await;
                this.settle(pending, result)
            }
            .instrument(span),
        )
    }

    fn notify(&self, notice: Notice) {
        // Nobody listening is fine
        let _ = self.notices.send(notice);
    }
}
