//! Subscriber-side access to the cached post list

use crate::cache::{FetchDecision, FetchTicket, QueryCache, QueryKey};
use crate::client::ForumApi;
use crate::common::utils::retry_with_backoff;
use crate::common::{Error, Result};
use crate::forum::Post;
use std::sync::Arc;
use std::time::Duration;

/// Cache key of the forum post list
pub const POSTS_KEY: &str = "forum/posts";

const FETCH_ATTEMPTS: usize = 3;
const FETCH_BACKOFF: Duration = Duration::from_millis(200);

pub fn posts_key() -> QueryKey {
    QueryKey::new(POSTS_KEY)
}

/// What a read did about freshness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefetchState {
    /// Cached value is fresh
    Fresh,
    /// A background refetch was started by this read
    Scheduled,
    /// A refetch was already running
    InFlight,
    /// A vote is pending on the list; refetch waits for it to settle
    Deferred,
    /// Stale, but no runtime was available to fetch on
    Unscheduled,
}

#[derive(Debug, Clone)]
pub struct FeedRead {
    pub posts: Option<Arc<Vec<Post>>>,
    pub refetch: RefetchState,
}

/// Releases a fetch claim if `refresh` is dropped mid-request
struct TicketGuard<'a> {
    cache: &'a QueryCache<Vec<Post>>,
    ticket: FetchTicket,
    armed: bool,
}

impl Drop for TicketGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.cache.abandon_fetch(&self.ticket);
        }
    }
}

/// Reader of the post list backed by the shared cache
#[derive(Clone)]
pub struct PostFeed {
    cache: Arc<QueryCache<Vec<Post>>>,
    api: Arc<dyn ForumApi>,
    key: QueryKey,
}

impl PostFeed {
    pub fn new(cache: Arc<QueryCache<Vec<Post>>>, api: Arc<dyn ForumApi>) -> Self {
        Self {
            cache,
            api,
            key: posts_key(),
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Cached list; schedules a background refetch when absent or stale
    pub fn read(&self) -> FeedRead {
        let cached = self.cache.read(&self.key);
        let stale = cached.as_ref().map_or(true, |c| c.stale);
        let posts = cached.map(|c| c.value);

        if !stale {
            return FeedRead {
                posts,
                refetch: RefetchState::Fresh,
            };
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(key = %self.key, "Stale read outside a runtime, not refetching");
            return FeedRead {
                posts,
                refetch: RefetchState::Unscheduled,
            };
        };

        let refetch = match self.cache.begin_fetch(&self.key) {
            FetchDecision::Started(ticket) => {
                let cache = self.cache.clone();
                let api = self.api.clone();
                let task_ticket = ticket.clone();
                let handle = runtime.spawn(async move {
                    let result =
                        retry_with_backoff(|| api.list_posts(), FETCH_ATTEMPTS, FETCH_BACKOFF)
                            .await;
                    if let Ok(posts) = &result {
                        tracing::debug!(count = posts.len(), "Refetched forum posts");
                    }
                    cache.complete_fetch(task_ticket, result);
                });
                self.cache.attach_abort(&ticket, handle.abort_handle());
                RefetchState::Scheduled
            }
            FetchDecision::InFlight => RefetchState::InFlight,
            FetchDecision::Deferred => RefetchState::Deferred,
        };

        FeedRead { posts, refetch }
    }

    /// Fetch now and wait for the result, superseding any background fetch
    pub async fn refresh(&self) -> Result<Arc<Vec<Post>>> {
        let ticket = match self.cache.begin_fetch(&self.key) {
            FetchDecision::Started(ticket) => ticket,
            FetchDecision::InFlight => {
                self.cache.cancel_in_flight(&self.key);
                match self.cache.begin_fetch(&self.key) {
                    FetchDecision::Started(ticket) => ticket,
                    _ => return self.cached_or_pending(),
                }
            }
            FetchDecision::Deferred => return self.cached_or_pending(),
        };

        let mut guard = TicketGuard {
            cache: &self.cache,
            ticket: ticket.clone(),
            armed: true,
        };
        let result = self.api.list_posts().await;
        guard.armed = false;

        match result {
            Ok(posts) => {
                if !self.cache.complete_fetch::<Error>(ticket, Ok(posts)) {
                    tracing::debug!(key = %self.key, "Refresh superseded before it landed");
                }
                self.cached_or_pending()
            }
            Err(e) => {
                self.cache.complete_fetch::<String>(ticket, Err(e.to_string()));
                Err(e)
            }
        }
    }

    fn cached_or_pending(&self) -> Result<Arc<Vec<Post>>> {
        self.cache
            .read(&self.key)
            .map(|c| c.value)
            .ok_or_else(|| Error::Internal(format!("{} has no cached value yet", self.key)))
    }
}
