use std::time::Duration;

use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::info;

use crate::error::CacheError;

/// Redis-backed store shared across processes. Expiry is enforced by the
/// server (`SET key value EX ttl`).
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let mut conn = tokio::time::timeout(timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| CacheError::ConnectTimeout {
                timeout_ms: timeout.as_millis() as u64,
            })??;
        let _: String = tokio::time::timeout(timeout, redis::cmd("PING").query_async(&mut conn))
            .await
            .map_err(|_| CacheError::ConnectTimeout {
                timeout_ms: timeout.as_millis() as u64,
            })??;
        info!("connected to redis cache backend");
        Ok(Self { conn })
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    pub async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let secs = ttl.as_secs().max(1);
        let _: () = conn.set_ex(key, value, secs).await?;
        Ok(())
    }
}
