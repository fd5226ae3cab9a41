//! In-memory TTL cache over storage reads.
//!
//! A derived, disposable view, never a second source of truth. Every entry
//! carries its own expiry; there is no LRU and no global size bound, only
//! lazy eviction on access and an opportunistic sweep on insert. The manager
//! is the sole reader and writer; its invalidation contract is: after a
//! successful store write, the written key (and any range keys covering it)
//! is invalidated before the save call returns.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use crate::traits::Clock;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: DateTime<Utc>,
}

/// Key-value cache with per-entry time-to-live.
///
/// Expiry is measured against an injected [`Clock`], so tests advance a
/// `MockClock` instead of sleeping.
pub struct TtlCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TtlCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    /// Fetch a live entry; expired entries are dropped on the spot.
    pub fn get(&self, key: &str) -> Option<Value> {
        let now = self.clock.now_utc();
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Insert a value with the cache's TTL, sweeping out any entries that
    /// have already expired.
    pub fn put(&self, key: &str, value: Value) {
        let now = self.clock.now_utc();
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: now + self.ttl,
            },
        );
    }

    /// Drop a single key.
    pub fn invalidate(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
    }

    /// Drop every key the predicate matches. Used for range keys covering a
    /// just-written date.
    pub fn invalidate_matching(&self, predicate: impl Fn(&str) -> bool) {
        self.entries.lock().unwrap().retain(|key, _| !predicate(key));
    }

    /// Drop everything.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    /// Number of (possibly expired) entries currently held.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
