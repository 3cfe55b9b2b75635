//! Per-user conversation state.
//!
//! A [`ChainStore`] maps a user id to the [`ChainToken`] marking which step of
//! a conversation that user is on. Entries expire after a time-to-live and
//! the store is capped at a maximum number of entries; when the cap is hit
//! the least recently updated entries are evicted first. Expired entries are
//! treated as absent.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Default time-to-live of a conversation step.
pub const DEFAULT_CHAIN_TTL: Duration = Duration::from_secs(60 * 60);

/// Default maximum number of concurrent conversations.
pub const DEFAULT_CHAIN_CAPACITY: usize = 10_000;

/// Opaque marker of a conversation step.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChainToken(String);

impl ChainToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ChainToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ChainToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ChainToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

struct Entry {
    token: ChainToken,
    updated: Instant,
}

/// Shared, in-memory conversation state keyed by user id.
///
/// Cloning is cheap and clones share the same entries, so one store can back
/// several conversation handlers.
#[derive(Clone)]
pub struct ChainStore {
    entries: Arc<Mutex<HashMap<i64, Entry>>>,
    ttl: Option<Duration>,
    max_entries: usize,
}

impl Default for ChainStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainStore {
    /// Creates a store with the default TTL and capacity.
    pub fn new() -> Self {
        Self::with_limits(Some(DEFAULT_CHAIN_TTL), DEFAULT_CHAIN_CAPACITY)
    }

    /// Creates a store with explicit limits. `None` disables expiry.
    pub fn with_limits(ttl: Option<Duration>, max_entries: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    /// Returns the configured time-to-live.
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Returns the configured capacity.
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    fn is_expired(&self, entry: &Entry, now: Instant) -> bool {
        self.ttl
            .is_some_and(|ttl| now.saturating_duration_since(entry.updated) >= ttl)
    }

    /// Returns the live token for `user_id`, dropping it if it expired.
    pub fn get(&self, user_id: i64) -> Option<ChainToken> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match entries.get(&user_id) {
            Some(entry) if self.is_expired(entry, now) => {
                entries.remove(&user_id);
                debug!(user_id, "Conversation state expired");
                None
            }
            Some(entry) => Some(entry.token.clone()),
            None => None,
        }
    }

    /// Returns `true` if `user_id` has a live token.
    pub fn contains(&self, user_id: i64) -> bool {
        let now = Instant::now();
        self.entries
            .lock()
            .get(&user_id)
            .is_some_and(|e| !self.is_expired(e, now))
    }

    /// Stores `token` for `user_id`, replacing any previous token.
    pub fn insert(&self, user_id: i64, token: ChainToken) {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        entries.insert(
            user_id,
            Entry {
                token,
                updated: now,
            },
        );

        if entries.len() > self.max_entries {
            entries.retain(|_, e| !self.is_expired(e, now));
        }
        while entries.len() > self.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.updated)
                .map(|(id, _)| *id);
            match oldest {
                Some(id) => {
                    entries.remove(&id);
                    debug!(user_id = id, "Evicted conversation state over capacity");
                }
                None => break,
            }
        }
    }

    /// Removes the token for `user_id`.
    pub fn remove(&self, user_id: i64) -> Option<ChainToken> {
        self.entries.lock().remove(&user_id).map(|e| e.token)
    }

    /// Drops every expired entry and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| !self.is_expired(e, now));
        before - entries.len()
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl fmt::Debug for ChainStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainStore")
            .field("entries", &self.len())
            .field("ttl", &self.ttl)
            .field("max_entries", &self.max_entries)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_remove() {
        let store = ChainStore::new();
        assert!(store.get(1).is_none());
        store.insert(1, "ask_name".into());
        assert_eq!(store.get(1), Some(ChainToken::from("ask_name")));
        store.insert(1, "ask_age".into());
        assert_eq!(store.get(1).unwrap().as_str(), "ask_age");
        assert_eq!(store.remove(1), Some(ChainToken::from("ask_age")));
        assert!(!store.contains(1));
    }

    #[test]
    fn test_clones_share_entries() {
        let store = ChainStore::new();
        let other = store.clone();
        store.insert(5, "step".into());
        assert!(other.contains(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let store = ChainStore::with_limits(Some(Duration::from_secs(60)), 10);
        store.insert(1, "a".into());
        tokio::time::advance(Duration::from_secs(30)).await;
        store.insert(2, "b".into());
        assert!(store.contains(1));

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(!store.contains(1));
        assert!(store.get(1).is_none());
        assert!(store.contains(2));
        assert_eq!(store.len(), 1);

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(store.purge_expired(), 1);
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_evicts_least_recently_updated() {
        let store = ChainStore::with_limits(None, 2);
        store.insert(1, "a".into());
        tokio::time::advance(Duration::from_millis(10)).await;
        store.insert(2, "b".into());
        tokio::time::advance(Duration::from_millis(10)).await;
        store.insert(1, "a2".into());
        tokio::time::advance(Duration::from_millis(10)).await;
        store.insert(3, "c".into());

        assert_eq!(store.len(), 2);
        assert!(store.contains(1));
        assert!(!store.contains(2));
        assert!(store.contains(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reads_do_not_delay_eviction() {
        let store = ChainStore::with_limits(None, 2);
        store.insert(1, "a".into());
        tokio::time::advance(Duration::from_millis(10)).await;
        store.insert(2, "b".into());
        tokio::time::advance(Duration::from_millis(10)).await;
        assert!(store.get(1).is_some());
        store.insert(3, "c".into());

        assert!(!store.contains(1));
        assert!(store.contains(2));
    }
}
