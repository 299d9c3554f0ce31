//! Block Store (C4): scoped deny-list backed by Redis, keyed
//! `blocked:<scope>:<id>` so user, IP, and API-key blocks never collide
//! (§4.5).
//!
//! Grounded on [`KvClient`](crate::services::kv::KvClient)'s `set_ex` /
//! `set_persist` / `del` / `exists` / `scan_keys`, the same primitives the
//! teacher's rate-limit middleware used directly against Redis before this
//! crate introduced a shared KV client.

use serde::{Deserialize, Serialize};

use crate::services::kv::{KvClient, KvError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockScope {
    User,
    Ip,
    Key,
}

impl BlockScope {
    fn as_str(self) -> &'static str {
        match self {
            BlockScope::User => "user",
            BlockScope::Ip => "ip",
            BlockScope::Key => "key",
        }
    }
}

/// Outcome of an `is_blocked` lookup (§4.5): a present key with a remaining
/// TTL is temporary, present with none/negative is permanent.
#[derive(Debug, Clone, Default)]
pub struct BlockStatus {
    pub blocked: bool,
    pub reason: Option<String>,
    pub expires_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockRecord {
    pub id: String,
    pub reason: String,
    pub blocked_at: String,
}

pub struct BlockStore {
    kv: KvClient,
}

fn key_for(scope: BlockScope, id: &str) -> String {
    format!("blocked:{}:{}", scope.as_str(), id)
}

impl BlockStore {
    pub fn new(kv: KvClient) -> Self {
        Self { kv }
    }

    /// Blocks `id` under `scope`. `ttl_secs = None` blocks indefinitely
    /// (e.g. an operator-issued block); `Some(secs)` is used for the
    /// automatic post-threshold blocks from [`crate::services::login_attempts`].
    pub async fn block(
        &self,
        scope: BlockScope,
        id: &str,
        reason: &str,
        ttl_secs: Option<u64>,
    ) -> Result<(), KvError> {
        let record = BlockRecord {
            id: id.to_string(),
            reason: reason.to_string(),
            blocked_at: chrono::Utc::now().to_rfc3339(),
        };
        let payload = serde_json::to_string(&record).unwrap_or_default();
        let key = key_for(scope, id);
        match ttl_secs {
            Some(ttl) => self.kv.set_ex(&key, &payload, ttl).await,
            None => self.kv.set_persist(&key, &payload).await,
        }
    }

    pub async fn unblock(&self, scope: BlockScope, id: &str) -> Result<bool, KvError> {
        self.kv.del(&key_for(scope, id)).await
    }

    /// Returns `(blocked, reason, expires_at)` per §4.4: a present key with
    /// a remaining TTL is temporary, present with none/negative is
    /// permanent.
    pub async fn is_blocked(&self, scope: BlockScope, id: &str) -> Result<BlockStatus, KvError> {
        let key = key_for(scope, id);
        let Some(raw) = self.kv.get(&key).await? else {
            return Ok(BlockStatus::default());
        };
        let reason = serde_json::from_str::<BlockRecord>(&raw).ok().map(|r| r.reason);
        let ttl = self.kv.ttl(&key).await?;
        let expires_at = if ttl > 0 {
            Some((chrono::Utc::now() + chrono::Duration::seconds(ttl)).to_rfc3339())
        } else {
            None
        };
        Ok(BlockStatus {
            blocked: true,
            reason,
            expires_at,
        })
    }

    /// Lists every currently blocked id in `scope`, for the admin API (C15).
    pub async fn list(&self, scope: BlockScope) -> Result<Vec<BlockRecord>, KvError> {
        let pattern = format!("blocked:{}:*", scope.as_str());
        let keys = self.kv.scan_keys(&pattern).await?;
        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(raw) = self.kv.get(&key).await? {
                if let Ok(record) = serde_json::from_str::<BlockRecord>(&raw) {
                    records.push(record);
                }
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_schema_is_scope_prefixed() {
        assert_eq!(key_for(BlockScope::User, "u-1"), "blocked:user:u-1");
        assert_eq!(key_for(BlockScope::Ip, "10.0.0.1"), "blocked:ip:10.0.0.1");
        assert_eq!(key_for(BlockScope::Key, "ak-1"), "blocked:key:ak-1");
    }
}
