//! Keyed request cache with fetch tracking and optimistic writes
//!
//! Every write bumps the entry's version. Fetches are tracked by a
//! generation number so that a cancelled or superseded fetch can never
//! land in the cache. Optimistic writes remember the version they produced;
//! a rollback only restores its snapshot while that version is still the
//! current one. Versions come from one cache-wide clock, so they never
//! repeat for a key even across evictions.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::AbortHandle;

use crate::common::timestamp_now_millis;

/// Cache key (e.g. `forum/posts`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(String);

impl QueryKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Value as seen by a reader
#[derive(Debug, Clone)]
pub struct CachedValue<V> {
    pub value: Arc<V>,
    pub version: u64,
    /// Unix millis of the last write
    pub updated_at: u64,
    pub stale: bool,
}

/// Change notifications for subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    Written { key: QueryKey, version: u64 },
    Invalidated { key: QueryKey },
    Restored { key: QueryKey, version: u64 },
    Evicted { key: QueryKey },
}

/// Outcome of asking to start a fetch
#[derive(Debug)]
pub enum FetchDecision {
    /// Caller owns the fetch and must report back via `complete_fetch`
    Started(FetchTicket),
    /// Another fetch for this key is already running
    InFlight,
    /// An optimistic write is pending; fetching now would clobber it
    Deferred,
}

/// Proof of ownership of one fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    key: QueryKey,
    generation: u64,
}

impl FetchTicket {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }
}

/// Record of an optimistic write, needed to commit or roll it back
#[derive(Debug)]
pub struct OptimisticWrite<V> {
    key: QueryKey,
    /// Incarnation of the entry the write went into
    epoch: u64,
    snapshot: Option<Arc<V>>,
    snapshot_stale: bool,
    /// Version produced by the optimistic write; `None` when nothing was written
    written_version: Option<u64>,
}

impl<V> OptimisticWrite<V> {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Value captured before the optimistic write
    pub fn snapshot(&self) -> Option<&Arc<V>> {
        self.snapshot.as_ref()
    }

    pub fn wrote(&self) -> bool {
        self.written_version.is_some()
    }
}

/// What a rollback did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackOutcome {
    /// Snapshot written back verbatim
    Restored,
    /// A later write owns the entry; snapshot dropped, refetch scheduled once idle
    Superseded,
    /// The optimistic step wrote nothing
    Unchanged,
    /// The entry was evicted after the write; there is nothing left to undo
    Evicted,
}

struct InFlight {
    generation: u64,
    abort: Option<AbortHandle>,
}

struct Entry<V> {
    epoch: u64,
    value: Option<Arc<V>>,
    version: u64,
    written_at: Option<Instant>,
    updated_at: u64,
    stale: bool,
    next_generation: u64,
    fetch: Option<InFlight>,
    pending_mutations: usize,
    invalidate_when_idle: bool,
}

impl<V> Entry<V> {
    fn new(epoch: u64) -> Self {
        Self {
            epoch,
            value: None,
            version: 0,
            written_at: None,
            updated_at: 0,
            stale: true,
            next_generation: 0,
            fetch: None,
            pending_mutations: 0,
            invalidate_when_idle: false,
        }
    }

    fn store(&mut self, value: Option<Arc<V>>, version: u64) -> u64 {
        self.value = value;
        self.version = version;
        self.written_at = Some(Instant::now());
        self.updated_at = timestamp_now_millis();
        self.version
    }

    fn cancel_fetch(&mut self) -> bool {
        match self.fetch.take() {
            Some(in_flight) => {
                if let Some(abort) = in_flight.abort {
                    abort.abort();
                }
                true
            }
            None => false,
        }
    }
}

/// Shared request cache
pub struct QueryCache<V> {
    entries: Mutex<HashMap<QueryKey, Entry<V>>>,
    events: broadcast::Sender<CacheEvent>,
    stale_after: Option<Duration>,
    /// Source of versions and entry epochs
    clock: AtomicU64,
}

impl<V> Default for QueryCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> QueryCache<V> {
    pub fn new() -> Self {
        Self::with_stale_after(None)
    }

    /// Entries older than `stale_after` read as stale
    pub fn with_stale_after(stale_after: Option<Duration>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            entries: Mutex::new(HashMap::new()),
            events,
            stale_after,
            clock: AtomicU64::new(0),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Entry for `key`, created with a fresh epoch when absent
    fn slot<'a>(
        &self,
        entries: &'a mut HashMap<QueryKey, Entry<V>>,
        key: &QueryKey,
    ) -> &'a mut Entry<V> {
        entries
            .entry(key.clone())
            .or_insert_with(|| Entry::new(self.tick()))
    }

    /// Entry an optimistic write went into, unless it has been evicted since
    fn owning_slot<'a>(
        entries: &'a mut HashMap<QueryKey, Entry<V>>,
        write: &OptimisticWrite<V>,
    ) -> Option<&'a mut Entry<V>> {
        entries
            .get_mut(&write.key)
            .filter(|entry| entry.epoch == write.epoch)
    }

    fn emit(&self, event: CacheEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    fn is_entry_stale(&self, entry: &Entry<V>) -> bool {
        if entry.stale || entry.value.is_none() {
            return true;
        }
        match (self.stale_after, entry.written_at) {
            (Some(max_age), Some(at)) => at.elapsed() >= max_age,
            _ => false,
        }
    }

    /// Current value, without triggering any fetch
    pub fn read(&self, key: &QueryKey) -> Option<CachedValue<V>> {
        let entries = self.entries();
        let entry = entries.get(key)?;
        let value = entry.value.clone()?;
        Some(CachedValue {
            value,
            version: entry.version,
            updated_at: entry.updated_at,
            stale: self.is_entry_stale(entry),
        })
    }

    /// Replace the value; visible to every later read
    pub fn write(&self, key: &QueryKey, value: V) -> u64 {
        let version = {
            let mut entries = self.entries();
            let entry = self.slot(&mut entries, key);
            let version = entry.store(Some(Arc::new(value)), self.tick());
            entry.stale = false;
            version
        };
        self.emit(CacheEvent::Written {
            key: key.clone(),
            version,
        });
        version
    }

    /// Mark stale so the next subscriber read refetches
    pub fn invalidate(&self, key: &QueryKey) {
        {
            let mut entries = self.entries();
            self.slot(&mut entries, key).stale = true;
        }
        tracing::debug!(key = %key, "Cache entry invalidated");
        self.emit(CacheEvent::Invalidated { key: key.clone() });
    }

    /// Absent and invalidated entries are stale
    pub fn is_stale(&self, key: &QueryKey) -> bool {
        let entries = self.entries();
        entries
            .get(key)
            .map_or(true, |entry| self.is_entry_stale(entry))
    }

    /// Best-effort cancellation of the outstanding fetch; its result will be discarded
    pub fn cancel_in_flight(&self, key: &QueryKey) -> bool {
        let cancelled = self
            .entries()
            .get_mut(key)
            .map_or(false, |entry| entry.cancel_fetch());
        if cancelled {
            tracing::debug!(key = %key, "Cancelled in-flight fetch");
        }
        cancelled
    }

    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        self.entries()
            .get(key)
            .map_or(false, |entry| entry.fetch.is_some())
    }

    pub fn pending_mutations(&self, key: &QueryKey) -> usize {
        self.entries()
            .get(key)
            .map_or(0, |entry| entry.pending_mutations)
    }

    /// Claim the right to fetch `key`
    pub fn begin_fetch(&self, key: &QueryKey) -> FetchDecision {
        let mut entries = self.entries();
        let entry = self.slot(&mut entries, key);
        if entry.pending_mutations > 0 {
            return FetchDecision::Deferred;
        }
        if entry.fetch.is_some() {
            return FetchDecision::InFlight;
        }
        entry.next_generation += 1;
        let generation = entry.next_generation;
        entry.fetch = Some(InFlight {
            generation,
            abort: None,
        });
        FetchDecision::Started(FetchTicket {
            key: key.clone(),
            generation,
        })
    }

    /// Register the task running a fetch so `cancel_in_flight` can abort it
    pub fn attach_abort(&self, ticket: &FetchTicket, abort: AbortHandle) {
        let mut entries = self.entries();
        match entries
            .get_mut(&ticket.key)
            .and_then(|entry| entry.fetch.as_mut())
        {
            Some(in_flight) if in_flight.generation == ticket.generation => {
                in_flight.abort = Some(abort);
            }
            // Already finished or cancelled
            _ => {}
        }
    }

    /// Release a fetch claim without a result (owner went away)
    pub fn abandon_fetch(&self, ticket: &FetchTicket) {
        let mut entries = self.entries();
        if let Some(entry) = entries.get_mut(&ticket.key) {
            let owned = entry
                .fetch
                .as_ref()
                .map_or(false, |in_flight| in_flight.generation == ticket.generation);
            if owned {
                entry.fetch = None;
            }
        }
    }

    /// Land a fetch result. Returns false when the ticket was cancelled or
    /// superseded, or the fetch failed; the cache is left untouched then.
    pub fn complete_fetch<E: fmt::Display>(
        &self,
        ticket: FetchTicket,
        result: std::result::Result<V, E>,
    ) -> bool {
        let version = {
            let mut entries = self.entries();
            let Some(entry) = entries.get_mut(&ticket.key) else {
                return false;
            };
            let current = entry
                .fetch
                .as_ref()
                .map_or(false, |in_flight| in_flight.generation == ticket.generation);
            if !current {
                tracing::debug!(key = %ticket.key, "Discarding result of cancelled fetch");
                return false;
            }
            entry.fetch = None;
            match result {
                Ok(value) => {
                    let version = entry.store(Some(Arc::new(value)), self.tick());
                    entry.stale = false;
                    version
                }
                Err(e) => {
                    tracing::warn!(key = %ticket.key, "Fetch failed: {}", e);
                    return false;
                }
            }
        };
        self.emit(CacheEvent::Written {
            key: ticket.key,
            version,
        });
        true
    }

    /// Cancel any fetch, snapshot the value, and write `mutate(current)` in one step.
    ///
    /// `mutate` returning `None` leaves the entry as is. Either way the key
    /// counts as having a pending mutation until the returned record is
    /// passed to `commit_optimistic` or `rollback_optimistic`.
    pub fn begin_optimistic<F>(&self, key: &QueryKey, mutate: F) -> OptimisticWrite<V>
    where
        F: FnOnce(Option<&V>) -> Option<V>,
    {
        let (write, cancelled) = {
            let mut entries = self.entries();
            let entry = self.slot(&mut entries, key);
            let cancelled = entry.cancel_fetch();
            let snapshot = entry.value.clone();
            let snapshot_stale = entry.stale;
            let written_version = mutate(snapshot.as_deref())
                .map(|next| entry.store(Some(Arc::new(next)), self.tick()));
            entry.pending_mutations += 1;
            (
                OptimisticWrite {
                    key: key.clone(),
                    epoch: entry.epoch,
                    snapshot,
                    snapshot_stale,
                    written_version,
                },
                cancelled,
            )
        };
        if cancelled {
            tracing::debug!(key = %key, "Cancelled in-flight fetch before optimistic write");
        }
        if let Some(version) = write.written_version {
            self.emit(CacheEvent::Written {
                key: key.clone(),
                version,
            });
        }
        write
    }

    /// Confirm an optimistic write: the entry is invalidated for refetch
    pub fn commit_optimistic(&self, write: OptimisticWrite<V>) {
        {
            let mut entries = self.entries();
            let Some(entry) = Self::owning_slot(&mut entries, &write) else {
                tracing::debug!(key = %write.key, "Committed write outlived its entry");
                return;
            };
            entry.pending_mutations = entry.pending_mutations.saturating_sub(1);
            entry.stale = true;
            // A later rollback may restore a fresh-looking snapshot; keep the refetch owed
            entry.invalidate_when_idle = entry.pending_mutations > 0;
        }
        tracing::debug!(key = %write.key, "Optimistic write committed, entry invalidated");
        self.emit(CacheEvent::Invalidated { key: write.key });
    }

    /// Undo an optimistic write
    pub fn rollback_optimistic(&self, write: OptimisticWrite<V>) -> RollbackOutcome {
        let (outcome, restored_version, invalidated) = {
            let mut entries = self.entries();
            let Some(entry) = Self::owning_slot(&mut entries, &write) else {
                tracing::debug!(key = %write.key, "Rolled back write outlived its entry");
                return RollbackOutcome::Evicted;
            };
            entry.pending_mutations = entry.pending_mutations.saturating_sub(1);

            let (outcome, restored_version) = match write.written_version {
                None => (RollbackOutcome::Unchanged, None),
                Some(version) if version == entry.version => {
                    let restored = entry.store(write.snapshot, self.tick());
                    entry.stale = write.snapshot_stale;
                    (RollbackOutcome::Restored, Some(restored))
                }
                Some(_) => {
                    entry.invalidate_when_idle = true;
                    (RollbackOutcome::Superseded, None)
                }
            };

            let invalidated = entry.pending_mutations == 0 && entry.invalidate_when_idle;
            if invalidated {
                entry.invalidate_when_idle = false;
                entry.stale = true;
            }
            (outcome, restored_version, invalidated)
        };

        if let Some(version) = restored_version {
            self.emit(CacheEvent::Restored {
                key: write.key.clone(),
                version,
            });
        }
        if invalidated {
            tracing::debug!(key = %write.key, "Superseded rollback settled, entry invalidated");
            self.emit(CacheEvent::Invalidated { key: write.key });
        }
        outcome
    }

    /// Drop the entry, aborting its fetch
    pub fn evict(&self, key: &QueryKey) -> bool {
        let removed = self.entries().remove(key);
        match removed {
            Some(mut entry) => {
                entry.cancel_fetch();
                self.emit(CacheEvent::Evicted { key: key.clone() });
                true
            }
            None => false,
        }
    }
}
