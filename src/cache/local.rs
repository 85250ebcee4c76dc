use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::trace;

struct LocalEntry {
    value: String,
    expires_at: Instant,
    generation: u64,
}

type EntryMap = Mutex<HashMap<String, LocalEntry>>;

/// Process-local store. Every `set` schedules its own deletion; reads also
/// refuse entries past their deadline so a late timer never serves stale
/// data.
#[derive(Clone, Default)]
pub struct LocalStore {
    entries: Arc<EntryMap>,
    generation: Arc<AtomicU64>,
}

impl LocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock();
        let entry = entries.get(key)?;
        if entry.expires_at <= Instant::now() {
            entries.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }

    /// Must be called inside a tokio runtime.
    pub fn set(&self, key: &str, value: String, ttl: Duration) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().insert(
            key.to_string(),
            LocalEntry {
                value,
                expires_at: Instant::now() + ttl,
                generation,
            },
        );

        let entries = Arc::downgrade(&self.entries);
        let key = key.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let Some(entries) = entries.upgrade() else {
                return;
            };
            let mut entries = entries.lock();
            // A newer write owns its own timer.
            if entries.get(&key).is_some_and(|e| e.generation == generation) {
                entries.remove(&key);
                trace!(key = %key, "local cache entry evicted");
            }
        });
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
