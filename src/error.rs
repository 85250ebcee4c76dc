use thiserror::Error;

use crate::config::TtlClass;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("timed out after {timeout_ms}ms connecting to cache backend")]
    ConnectTimeout { timeout_ms: u64 },
}

/// Failure of the upstream call behind a cache miss. Never cached.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("upstream fetch failed for {class}:{key}: {source}")]
    Upstream {
        class: TtlClass,
        key: String,
        #[source]
        source: anyhow::Error,
    },
}

impl FetchError {
    pub fn key(&self) -> &str {
        match self {
            FetchError::Upstream { key, .. } => key,
        }
    }
}
