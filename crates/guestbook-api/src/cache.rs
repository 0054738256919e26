use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use anyhow::Result;
use guestbook_db::models::ReplyRow;
use tracing::debug;

pub type ReplyList = Arc<Vec<ReplyRow>>;

/// Cache key for the reply list of one message.
pub fn cache_key(message_id: i64) -> String {
    format!("replies_of_{}", message_id)
}

/// Eviction rules. The default keeps entries forever with no size bound.
#[derive(Debug, Clone, Copy, Default)]
pub struct CachePolicy {
    /// Oldest entries are evicted once this many are stored. `Some(0)`
    /// disables caching.
    pub max_entries: Option<usize>,
    pub ttl: Option<Duration>,
}

struct CachedReplies {
    replies: ReplyList,
    version: u64,
    stored_at: Instant,
    seq: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CachedReplies>,
    /// Bumped on every invalidation. A computed list is only stored if no
    /// invalidation happened while it was being read.
    epoch: u64,
    next_seq: u64,
}

/// Read-through cache of materialized reply lists, keyed per message.
///
/// Lists are populated lazily by [`ReplyListCache::get_or_compute`] and
/// dropped by [`ReplyListCache::invalidate`]. Writers never read through it.
pub struct ReplyListCache {
    policy: CachePolicy,
    state: Mutex<CacheState>,
}

impl ReplyListCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Returns the cached list for `message_id`, or runs `compute`, stores its
    /// result and returns it. `compute` runs without the cache lock held.
    pub fn get_or_compute<F>(&self, message_id: i64, compute: F) -> Result<ReplyList>
    where
        F: FnOnce() -> Result<Vec<ReplyRow>>,
    {
        let key = cache_key(message_id);

        let epoch = {
            let mut state = self.lock();
            if let Some(hit) = state.fresh(&key, self.policy.ttl) {
                debug!("Reply cache hit for {} (version {})", key, hit.version);
                return Ok(hit.replies.clone());
            }
            state.epoch
        };

        debug!("Reply cache miss for {}", key);
        let replies: ReplyList = Arc::new(compute()?);

        let mut state = self.lock();
        if state.epoch != epoch {
            debug!("Not caching {}: invalidated while loading", key);
            return Ok(replies);
        }
        if self.policy.max_entries == Some(0) {
            return Ok(replies);
        }

        if let Some(max) = self.policy.max_entries {
            while state.entries.len() >= max && !state.entries.contains_key(&key) {
                state.evict_oldest();
            }
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        state.entries.insert(
            key,
            CachedReplies {
                replies: replies.clone(),
                version: epoch,
                stored_at: Instant::now(),
                seq,
            },
        );
        Ok(replies)
    }

    /// Drops any cached list for `message_id`. No-op when nothing is cached.
    pub fn invalidate(&self, message_id: i64) {
        let key = cache_key(message_id);
        let mut state = self.lock();
        state.epoch += 1;
        if state.entries.remove(&key).is_some() {
            debug!("Invalidated {}", key);
        }
    }

    pub fn contains(&self, message_id: i64) -> bool {
        let key = cache_key(message_id);
        self.lock().fresh(&key, self.policy.ttl).is_some()
    }

    /// Version token of the cached entry, if any.
    #[cfg(test)]
    pub fn version(&self, message_id: i64) -> Option<u64> {
        let key = cache_key(message_id);
        self.lock().fresh(&key, self.policy.ttl).map(|e| e.version)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // The state is never left half-updated, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CacheState {
    fn fresh(&mut self, key: &str, ttl: Option<Duration>) -> Option<&CachedReplies> {
        let expired = match (self.entries.get(key), ttl) {
            (Some(entry), Some(ttl)) => entry.stored_at.elapsed() >= ttl,
            _ => false,
        };
        if expired {
            debug!("Reply cache entry {} expired", key);
            self.entries.remove(key);
        }
        self.entries.get(key)
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.seq)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            debug!("Evicting {} from reply cache", key);
            self.entries.remove(&key);
        }
    }
}
