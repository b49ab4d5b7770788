//! Time-bounded memoization of resolution results.
//!
//! Entries expire lazily: a stale entry is treated as absent on read and is
//! overwritten by the next `put`. Negative results are cached like positive ones.

use crate::model::ResolutionResult;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
struct CacheEntry {
    result: ResolutionResult,
    timestamp: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.timestamp.elapsed() < ttl
    }
}

#[derive(Debug)]
pub struct ResolutionCache {
    ttl: Duration,
    /// Size above which an insert sweeps expired entries
    capacity: usize,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl ResolutionCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Cached result for `key`, unless missing or older than the TTL.
    pub fn get(&self, key: &str) -> Option<ResolutionResult> {
        let entries = self.entries.lock().ok()?;
        let entry = entries.get(key)?;
        if entry.is_fresh(self.ttl) {
            Some(entry.result.clone())
        } else {
            debug!(key = key, "Cache entry expired");
            None
        }
    }

    pub fn put(&self, key: &str, result: ResolutionResult) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };

        entries.insert(
            key.to_string(),
            CacheEntry {
                result,
                timestamp: Instant::now(),
            },
        );

        if entries.len() > self.capacity {
            let ttl = self.ttl;
            let before = entries.len();
            entries.retain(|_, entry| entry.is_fresh(ttl));
            debug!(
                swept = before - entries.len(),
                remaining = entries.len(),
                "Swept expired cache entries"
            );
        }
    }

    /// Number of stored entries, stale ones included.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}
