use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::broadcast;
use tracing::trace;

use crate::key::CacheKey;

/// Narrow read/write interface over the query cache. Injected into
/// synchronizers and handlers instead of being reached as global state.
pub trait CacheStore: Send + Sync {
    fn get_query_data(&self, key: &CacheKey) -> Option<Value>;

    /// Run `updater` on the current value of `key` and store what it returns.
    /// Returning `None` leaves the slot as it was.
    fn set_query_data(
        &self,
        key: &CacheKey,
        updater: &mut dyn FnMut(Option<&Value>) -> Option<Value>,
    );
}

/// Notification sent to cache readers after a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheChange {
    Updated(CacheKey),
    /// Every slot under this prefix was dropped.
    Invalidated(CacheKey),
}

/// Process-wide in-memory cache. Cheap to clone; clones share storage.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<QueryCacheInner>,
}

struct QueryCacheInner {
    entries: Mutex<HashMap<CacheKey, Value>>,
    changes_tx: broadcast::Sender<CacheChange>,
}

impl QueryCache {
    pub fn new() -> Self {
        let (changes_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(QueryCacheInner {
                entries: Mutex::new(HashMap::new()),
                changes_tx,
            }),
        }
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheChange> {
        self.inner.changes_tx.subscribe()
    }

    /// Store `value` under `key`, replacing whatever was there.
    pub fn insert(&self, key: CacheKey, value: Value) {
        self.entries().insert(key.clone(), value);
        let _ = self.inner.changes_tx.send(CacheChange::Updated(key));
    }

    /// Drop every slot whose key starts with `prefix`. Returns how many went.
    pub fn invalidate_queries(&self, prefix: &CacheKey) -> usize {
        let removed = {
            let mut entries = self.entries();
            let before = entries.len();
            entries.retain(|key, _| !key.starts_with(prefix));
            before - entries.len()
        };
        if removed > 0 {
            trace!("invalidated {} cache entries under {}", removed, prefix);
            let _ = self
                .inner
                .changes_tx
                .send(CacheChange::Invalidated(prefix.clone()));
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<CacheKey, Value>> {
        // Values are plain data; a panic mid-write cannot leave one half-built.
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore for QueryCache {
    fn get_query_data(&self, key: &CacheKey) -> Option<Value> {
        self.entries().get(key).cloned()
    }

    fn set_query_data(
        &self,
        key: &CacheKey,
        updater: &mut dyn FnMut(Option<&Value>) -> Option<Value>,
    ) {
        // The lock is released while the updater runs so it may read other
        // slots through the same cache.
        let current = self.get_query_data(key);
        let Some(next) = updater(current.as_ref()) else {
            return;
        };
        if current.as_ref() == Some(&next) {
            return;
        }
        self.insert(key.clone(), next);
    }
}
