use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::cache::CacheBackend;
use crate::config::{CacheConfig, CacheTtls, TtlClass};
use crate::error::FetchError;

type Gate = Arc<tokio::sync::Mutex<()>>;

/// Read-through cache over an upstream call. Values are stored as JSON.
///
/// Failed upstream calls are never cached. With single-flight enabled,
/// concurrent misses on one key share a single upstream call; without it
/// every caller on a cold key goes upstream.
pub struct CachedFetcher {
    store: Arc<dyn CacheBackend>,
    ttls: CacheTtls,
    namespace: String,
    single_flight: bool,
    gates: Mutex<HashMap<String, Gate>>,
}

impl CachedFetcher {
    pub fn new(store: Arc<dyn CacheBackend>, cfg: &CacheConfig) -> Self {
        Self {
            store,
            ttls: cfg.ttls,
            namespace: cfg.namespace.clone(),
            single_flight: cfg.single_flight,
            gates: Mutex::new(HashMap::new()),
        }
    }

    pub fn full_key(&self, class: TtlClass, key: &str) -> String {
        format!("{}:{}:{}", self.namespace, class.as_str(), key)
    }

    /// Read-through with the TTL configured for `class`.
    pub async fn fetch<T, F, Fut>(
        &self,
        class: TtlClass,
        key: &str,
        fetch: F,
    ) -> Result<T, FetchError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        self.fetch_with_ttl(class, key, self.ttls.ttl(class), fetch)
            .await
    }

    pub async fn fetch_with_ttl<T, F, Fut>(
        &self,
        class: TtlClass,
        key: &str,
        ttl: Duration,
        fetch: F,
    ) -> Result<T, FetchError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let full_key = self.full_key(class, key);
        if let Some(hit) = self.lookup(&full_key).await {
            return Ok(hit);
        }
        if !self.single_flight {
            return self.fill(class, key, &full_key, ttl, fetch).await;
        }

        // Released on drop, so an abandoned future cannot leak its gate.
        let gate = self.gate(&full_key);
        let _turn = gate.gate.lock().await;
        // Whoever held the gate before us may have filled the key.
        match self.lookup(&full_key).await {
            Some(hit) => Ok(hit),
            None => self.fill(class, key, &full_key, ttl, fetch).await,
        }
    }

    async fn lookup<T: DeserializeOwned>(&self, full_key: &str) -> Option<T> {
        let raw = match self.store.get(full_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key = full_key, "cache miss");
                return None;
            }
            Err(err) => {
                warn!(key = full_key, error = %err, "cache read failed, treating as miss");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!(key = full_key, "cache hit");
                Some(value)
            }
            Err(err) => {
                warn!(key = full_key, error = %err, "undecodable cache entry, refetching");
                None
            }
        }
    }

    async fn fill<T, F, Fut>(
        &self,
        class: TtlClass,
        key: &str,
        full_key: &str,
        ttl: Duration,
        fetch: F,
    ) -> Result<T, FetchError>
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let value = fetch().await.map_err(|source| FetchError::Upstream {
            class,
            key: key.to_string(),
            source,
        })?;

        match serde_json::to_string(&value) {
            Ok(raw) => {
                if let Err(err) = self.store.set(full_key, raw, ttl).await {
                    warn!(key = full_key, error = %err, "cache write failed");
                }
            }
            Err(err) => warn!(key = full_key, error = %err, "value not cacheable"),
        }
        Ok(value)
    }

    fn gate(&self, full_key: &str) -> GateGuard<'_> {
        let gate = self
            .gates
            .lock()
            .entry(full_key.to_string())
            .or_default()
            .clone();
        GateGuard {
            fetcher: self,
            key: full_key.to_string(),
            gate,
        }
    }

    /// Keys with a live single-flight gate.
    #[cfg(test)]
    pub(crate) fn gate_count(&self) -> usize {
        self.gates.lock().len()
    }
}

struct GateGuard<'a> {
    fetcher: &'a CachedFetcher,
    key: String,
    gate: Gate,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        let mut gates = self.fetcher.gates.lock();
        let ours = gates
            .get(&self.key)
            .is_some_and(|g| Arc::ptr_eq(g, &self.gate));
        // Map + our handle; anyone else still waiting keeps it alive.
        if ours && Arc::strong_count(&self.gate) <= 2 {
            gates.remove(&self.key);
        }
    }
}
