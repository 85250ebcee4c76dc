//! Key/value caching in front of rate-limited upstream providers.
//!
//! The backend is chosen once, when the store is built: Redis when a URL is
//! configured and reachable, otherwise an in-process map. A running store
//! never switches backends.

mod distributed;
mod fetcher;
mod local;

use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::CacheConfig;
use crate::error::CacheError;

pub use distributed::RedisStore;
pub use fetcher::CachedFetcher;
pub use local::LocalStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Distributed,
    Local,
}

/// Get/set contract shared by every cache backend, including test fakes.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    fn kind(&self) -> BackendKind;
}

#[derive(Clone)]
pub enum CacheStore {
    Distributed(RedisStore),
    Local(LocalStore),
}

impl CacheStore {
    pub fn local() -> Self {
        CacheStore::Local(LocalStore::new())
    }

    /// Builds the store for this process. An unreachable Redis degrades to
    /// the local store for the whole run instead of failing startup.
    pub async fn connect(cfg: &CacheConfig) -> Self {
        let Some(url) = cfg.redis_url.as_deref() else {
            info!("no redis url configured, using process-local cache");
            return Self::local();
        };
        match RedisStore::connect(url, cfg.connect_timeout).await {
            Ok(store) => CacheStore::Distributed(store),
            Err(err) => {
                warn!(error = %err, "redis unavailable, falling back to process-local cache");
                Self::local()
            }
        }
    }

    /// Drops locally held entries. Redis entries are left to expire server-side.
    pub fn shutdown(&self) {
        match self {
            CacheStore::Distributed(_) => info!("cache store closed"),
            CacheStore::Local(store) => {
                info!(entries = store.len(), "clearing process-local cache");
                store.clear();
            }
        }
    }
}

#[async_trait]
impl CacheBackend for CacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        match self {
            CacheStore::Distributed(store) => store.get(key).await,
            CacheStore::Local(store) => Ok(store.get(key)),
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        match self {
            CacheStore::Distributed(store) => store.set(key, value, ttl).await,
            CacheStore::Local(store) => {
                store.set(key, value, ttl);
                Ok(())
            }
        }
    }

    fn kind(&self) -> BackendKind {
        match self {
            CacheStore::Distributed(_) => BackendKind::Distributed,
            CacheStore::Local(_) => BackendKind::Local,
        }
    }
}
