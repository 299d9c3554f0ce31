//! Login Attempt Tracker (C5): counts failed authentications per user and
//! per IP, escalating to an automatic [`BlockStore`] entry once a threshold
//! is crossed (§4.6).
//!
//! Counters live in Redis with a fixed 15 minute window: the TTL is set
//! once on the first failure and never refreshed by later ones, matching
//! §4.6's "set TTL=15 min on first write"; a block triggered by this
//! tracker is TTL'd for 30 minutes rather than permanent, so a user who
//! waits it out recovers without operator intervention.

use serde::Serialize;

use crate::services::block_store::{BlockScope, BlockStore};
use crate::services::kv::{KvClient, KvError};

const WINDOW_SECS: u64 = 15 * 60;
const BLOCK_TTL_SECS: u64 = 30 * 60;
const USER_THRESHOLD: i64 = 5;
const IP_THRESHOLD: i64 = 10;

pub struct LoginAttemptTracker {
    kv: KvClient,
    block_store: BlockStore,
}

fn user_key(user_id: &str) -> String {
    format!("login_attempts:{user_id}")
}

fn ip_key(ip: &str) -> String {
    format!("login_attempts:ip:{ip}")
}

impl LoginAttemptTracker {
    pub fn new(kv: KvClient, block_store: BlockStore) -> Self {
        Self { kv, block_store }
    }

    /// Records a failed login for both the user and the originating IP,
    /// blocking whichever crosses its threshold first.
    pub async fn record_failure(&self, user_id: &str, client_ip: &str) -> Result<(), KvError> {
        let user_count = self.bump(&user_key(user_id)).await?;
        if user_count >= USER_THRESHOLD {
            self.block_store
                .block(
                    BlockScope::User,
                    user_id,
                    "exceeded failed login attempt threshold",
                    Some(BLOCK_TTL_SECS),
                )
                .await?;
        }

        let ip_count = self.bump(&ip_key(client_ip)).await?;
        if ip_count >= IP_THRESHOLD {
            self.block_store
                .block(
                    BlockScope::Ip,
                    client_ip,
                    "exceeded failed login attempt threshold",
                    Some(BLOCK_TTL_SECS),
                )
                .await?;
        }

        Ok(())
    }

    /// Clears both counters after a successful authentication.
    pub async fn record_success(&self, user_id: &str, client_ip: &str) -> Result<(), KvError> {
        self.kv.del(&user_key(user_id)).await?;
        self.kv.del(&ip_key(client_ip)).await?;
        Ok(())
    }

    pub async fn user_attempt_count(&self, user_id: &str) -> Result<i64, KvError> {
        self.current_count(&user_key(user_id)).await
    }

    pub async fn ip_attempt_count(&self, client_ip: &str) -> Result<i64, KvError> {
        self.current_count(&ip_key(client_ip)).await
    }

    /// Read-only view for the admin API (§4.6): current count, remaining
    /// budget before the threshold trips, when the fixed window expires,
    /// and whether the subject is currently blocked.
    pub async fn user_status(&self, user_id: &str) -> Result<AttemptStatus, KvError> {
        self.status(&user_key(user_id), USER_THRESHOLD, BlockScope::User, user_id)
            .await
    }

    pub async fn ip_status(&self, client_ip: &str) -> Result<AttemptStatus, KvError> {
        self.status(&ip_key(client_ip), IP_THRESHOLD, BlockScope::Ip, client_ip)
            .await
    }

    async fn status(&self, key: &str, threshold: i64, scope: BlockScope, id: &str) -> Result<AttemptStatus, KvError> {
        let current = self.current_count(key).await?;
        let ttl = self.kv.ttl(key).await?;
        let window_expires_at = if ttl > 0 {
            Some((chrono::Utc::now() + chrono::Duration::seconds(ttl)).to_rfc3339())
        } else {
            None
        };
        let blocked = self.block_store.is_blocked(scope, id).await?.blocked;
        Ok(AttemptStatus {
            current,
            remaining: (threshold - current).max(0),
            window_expires_at,
            blocked,
        })
    }

    async fn current_count(&self, key: &str) -> Result<i64, KvError> {
        match self.kv.get(key).await? {
            Some(raw) => Ok(raw.parse().unwrap_or(0)),
            None => Ok(0),
        }
    }

    /// Increments the counter; the window TTL is set only on the first
    /// write (`INCR` returning `1`), not refreshed on every failure, so the
    /// window is fixed rather than sliding.
    async fn bump(&self, key: &str) -> Result<i64, KvError> {
        let count = self.kv.incr(key).await?;
        if count == 1 {
            self.kv.pexpire(key, (WINDOW_SECS * 1000) as i64).await?;
        }
        Ok(count)
    }
}

/// Read-only login-attempt view exposed by the admin API (§4.6).
#[derive(Debug, Clone, Serialize)]
pub struct AttemptStatus {
    pub current: i64,
    pub remaining: i64,
    pub window_expires_at: Option<String>,
    pub blocked: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_match_spec_defaults() {
        assert_eq!(USER_THRESHOLD, 5);
        assert_eq!(IP_THRESHOLD, 10);
        assert_eq!(BLOCK_TTL_SECS, 1800);
        assert_eq!(WINDOW_SECS, 900);
    }

    #[test]
    fn key_schema_matches_block_store_scopes() {
        assert_eq!(user_key("u-1"), "login_attempts:u-1");
        assert_eq!(ip_key("10.0.0.1"), "login_attempts:ip:10.0.0.1");
    }
}
