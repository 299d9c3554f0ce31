//! Key-Value Client (C1): a reactive wrapper over Redis providing
//! GET/SET/DEL/EXPIRE/TTL/EVAL with connection pooling and a bounded
//! per-command timeout.
//!
//! Grounded on the Redis `ConnectionManager` + `AsyncCommands` pattern used
//! for rate limiting in the wider example pack (`integration-gateway`'s
//! `RedisRateLimiter`), generalized here into the one shared client that C4,
//! C5, and C6 all build on. `ConnectionManager` is constructed once at
//! startup and cloned (cheap — it's backed by a single multiplexed
//! connection with automatic reconnect) into every worker, matching the
//! "process-wide, sized from config" pooling policy in §5.

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisError, Script};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("redis command timed out after {0:?}")]
    Timeout(Duration),
    #[error("redis error: {0}")]
    Redis(#[from] RedisError),
}

/// Thin async wrapper around `redis::aio::ConnectionManager` with a fixed
/// per-command timeout (default 200ms per §5).
#[derive(Clone)]
pub struct KvClient {
    conn: ConnectionManager,
    timeout: Duration,
}

impl KvClient {
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, KvError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn, timeout })
    }

    async fn with_timeout<F, T>(&self, fut: F) -> Result<T, KvError>
    where
        F: std::future::Future<Output = Result<T, RedisError>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| KvError::Timeout(self.timeout))?
            .map_err(KvError::from)
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut conn = self.conn.clone();
        self.with_timeout(async move { conn.get(key).await }).await
    }

    pub async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), KvError> {
        let mut conn = self.conn.clone();
        let key = key.to_string();
        let value = value.to_string();
        self.with_timeout(async move { conn.set_ex(key, value, ttl_secs).await })
            .await
    }

    pub async fn set_persist(&self, key: &str, value: &str) -> Result<(), KvError> {
        let mut conn = self.conn.clone();
        let key = key.to_string();
        let value = value.to_string();
        self.with_timeout(async move { conn.set(key, value).await }).await
    }

    pub async fn del(&self, key: &str) -> Result<bool, KvError> {
        let mut conn = self.conn.clone();
        let deleted: i64 = self.with_timeout(async move { conn.del(key).await }).await?;
        Ok(deleted > 0)
    }

    pub async fn exists(&self, key: &str) -> Result<bool, KvError> {
        let mut conn = self.conn.clone();
        self.with_timeout(async move { conn.exists(key).await }).await
    }

    /// Seconds remaining for `key`, per Redis `TTL` semantics: `-1` means no
    /// expiry (permanent), `-2` means the key does not exist.
    pub async fn ttl(&self, key: &str) -> Result<i64, KvError> {
        let mut conn = self.conn.clone();
        self.with_timeout(async move { conn.ttl(key).await }).await
    }

    pub async fn pexpire(&self, key: &str, ttl_ms: i64) -> Result<bool, KvError> {
        let mut conn = self.conn.clone();
        let key = key.to_string();
        self.with_timeout(async move { conn.pexpire(key, ttl_ms).await }).await
    }

    pub async fn incr(&self, key: &str) -> Result<i64, KvError> {
        let mut conn = self.conn.clone();
        let key = key.to_string();
        self.with_timeout(async move { conn.incr(key, 1).await }).await
    }

    /// Scans keys matching `pattern` (e.g. `blocked:user:*`) using `SCAN`
    /// rather than the blocking `KEYS` command.
    pub async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, KvError> {
        let mut conn = self.conn.clone();
        let pattern = pattern.to_string();
        self.with_timeout(async move {
            let mut iter: redis::AsyncIter<String> = conn.scan_match(pattern).await?;
            let mut keys = Vec::new();
            use futures_util::StreamExt;
            while let Some(key) = iter.next().await {
                keys.push(key);
            }
            Ok(keys)
        })
        .await
    }

    /// Runs a Lua script, used for the atomic token-bucket update (C6).
    pub async fn eval_script(
        &self,
        script: &Script,
        keys: &[&str],
        args: &[String],
    ) -> Result<Vec<i64>, KvError> {
        let mut conn = self.conn.clone();
        let mut invocation = script.prepare_invoke();
        for key in keys {
            invocation.key(*key);
        }
        for arg in args {
            invocation.arg(arg);
        }
        self.with_timeout(async move { invocation.invoke_async(&mut conn).await })
            .await
    }
}
