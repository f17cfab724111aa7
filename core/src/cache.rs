//! In-memory query cache: an explicit map from query key to cached value.
//!
//! # Design
//! Each entry carries a generation counter. Starting a fetch bumps the
//! generation and hands out a `FetchTicket`; cancelling bumps it too. When a
//! fetch resolves, its result is written only if the ticket still matches,
//! so a superseded or cancelled fetch can never clobber a newer write.
//!
//! All operations take the lock briefly and return owned clones. Callers
//! never hold the lock across an await point, so reads are never torn.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryKey(&'static str);

impl QueryKey {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

/// Proof that a fetch was started at a particular generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct FetchTicket {
    generation: u64,
}

#[derive(Debug)]
struct Entry<V> {
    data: Option<V>,
    error: Option<String>,
    fetching: bool,
    generation: u64,
}

impl<V> Default for Entry<V> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            fetching: false,
            generation: 0,
        }
    }
}

/// Point-in-time view of one cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryStatus<V> {
    pub data: Option<V>,
    pub error: Option<String>,
    pub fetching: bool,
}

#[derive(Debug)]
pub struct QueryCache<V> {
    entries: Mutex<HashMap<QueryKey, Entry<V>>>,
}

impl<V> Default for QueryCache<V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<V: Clone> QueryCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry<V>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, key: QueryKey) -> Option<V> {
        self.lock().get(&key).and_then(|e| e.data.clone())
    }

    pub fn set(&self, key: QueryKey, value: V) {
        self.lock().entry(key).or_default().data = Some(value);
    }

    /// Replace the value with `f(current)`. Returning `None` empties the entry.
    pub fn update(&self, key: QueryKey, f: impl FnOnce(Option<&V>) -> Option<V>) {
        let mut entries = self.lock();
        let entry = entries.entry(key).or_default();
        entry.data = f(entry.data.as_ref());
    }

    /// Put back a previously captured value, including "no data".
    pub fn restore(&self, key: QueryKey, snapshot: Option<V>) {
        self.lock().entry(key).or_default().data = snapshot;
    }

    /// Mark any in-flight fetch for `key` stale. Returns whether one was
    /// running.
    pub fn cancel(&self, key: QueryKey) -> bool {
        let mut entries = self.lock();
        let entry = entries.entry(key).or_default();
        let was_fetching = entry.fetching;
        entry.generation += 1;
        entry.fetching = false;
        if was_fetching {
            debug!("cancelled in-flight fetch for {}", key.name());
        }
        was_fetching
    }

    /// Start a fetch, superseding any fetch already in flight.
    pub fn begin_fetch(&self, key: QueryKey) -> FetchTicket {
        let mut entries = self.lock();
        let entry = entries.entry(key).or_default();
        entry.generation += 1;
        entry.fetching = true;
        FetchTicket {
            generation: entry.generation,
        }
    }

    /// Store a fetch result. Returns `false` and drops `value` if the ticket
    /// is stale.
    pub fn finish_fetch(&self, key: QueryKey, ticket: FetchTicket, value: V) -> bool {
        let mut entries = self.lock();
        let entry = entries.entry(key).or_default();
        if entry.generation != ticket.generation {
            debug!("discarding stale fetch result for {}", key.name());
            return false;
        }
        entry.data = Some(value);
        entry.error = None;
        entry.fetching = false;
        true
    }

    /// Record a fetch failure. Existing data is kept.
    pub fn fail_fetch(&self, key: QueryKey, ticket: FetchTicket, message: String) -> bool {
        let mut entries = self.lock();
        let entry = entries.entry(key).or_default();
        if entry.generation != ticket.generation {
            debug!("discarding stale fetch error for {}", key.name());
            return false;
        }
        entry.error = Some(message);
        entry.fetching = false;
        true
    }

    pub fn status(&self, key: QueryKey) -> QueryStatus<V> {
        let entries = self.lock();
        match entries.get(&key) {
            Some(entry) => QueryStatus {
                data: entry.data.clone(),
                error: entry.error.clone(),
                fetching: entry.fetching,
            },
            None => QueryStatus {
                data: None,
                error: None,
                fetching: false,
            },
        }
    }

    /// Drop the entry entirely. Outstanding tickets become stale.
    pub fn remove(&self, key: QueryKey) {
        let mut entries = self.lock();
        if let Some(entry) = entries.get_mut(&key) {
            *entry = Entry {
                generation: entry.generation + 1,
                ..Entry::default()
            };
        }
    }
}
