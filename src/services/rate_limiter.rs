//! Rate Limiter (C6): atomic token-bucket enforcement against Redis via a
//! single `EVAL`, per §3/§4.7.
//!
//! Grounded on [`KvClient::eval_script`](crate::services::kv::KvClient) for
//! the atomic primitive; the token-bucket math itself follows the teacher's
//! `middleware::rate_limit` (refill-on-read against a stored timestamp)
//! translated from Rust-side read/modify/write into a single Lua script so
//! concurrent requests against the same bucket can't race between the GET
//! and the SET (a correctness gap the teacher's in-process version didn't
//! have to worry about, since it held the bucket behind a process-local
//! mutex rather than shared Redis state).

use once_cell::sync::Lazy;
use redis::Script;

use crate::models::route::RateLimitPolicy;
use crate::services::kv::{KvClient, KvError};
use crate::services::telemetry::{RateLimitEvent, TelemetryEmitter};

/// `KEYS[1]` = bucket key.
/// `ARGV[1]` = burst capacity, `ARGV[2]` = replenish rate/sec,
/// `ARGV[3]` = requested tokens, `ARGV[4]` = now (ms), `ARGV[5]` = bucket TTL (secs).
///
/// Returns `{allowed (0/1), remaining, tokens_after_refill_floor}`.
static TOKEN_BUCKET_SCRIPT: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"
local key = KEYS[1]
local capacity = tonumber(ARGV[1])
local rate = tonumber(ARGV[2])
local requested = tonumber(ARGV[3])
local now = tonumber(ARGV[4])
local ttl = tonumber(ARGV[5])

local bucket = redis.call('HMGET', key, 'tokens', 'ts')
local tokens = tonumber(bucket[1])
local last_ts = tonumber(bucket[2])

if tokens == nil then
  tokens = capacity
  last_ts = now
end

local delta_ms = now - last_ts
if delta_ms < 0 then delta_ms = 0 end
tokens = math.min(capacity, tokens + (delta_ms / 1000.0) * rate)

local allowed = 0
if tokens >= requested then
  tokens = tokens - requested
  allowed = 1
end

redis.call('HMSET', key, 'tokens', tokens, 'ts', now)
redis.call('EXPIRE', key, ttl)

return {allowed, math.floor(tokens), 0}
"#,
    )
});

#[derive(Debug, Clone, Copy)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at_epoch_secs: u64,
}

pub struct RateLimiter {
    kv: KvClient,
    telemetry: TelemetryEmitter,
}

impl RateLimiter {
    pub fn new(kv: KvClient, telemetry: TelemetryEmitter) -> Self {
        Self { kv, telemetry }
    }

    /// Evaluates one token-bucket decision for `subject` (e.g. `user:<sub>`
    /// or `ip:<addr>` from `RequestContext::rate_limit_subject`) against
    /// `policy_name`/`policy`. Fails open (allows the request) and emits a
    /// WARN-level telemetry event if Redis is unavailable, per §5's
    /// degraded-dependency posture.
    pub async fn check(
        &self,
        request_id: &str,
        policy_name: &str,
        policy: &RateLimitPolicy,
        subject: &str,
    ) -> RateLimitResult {
        let key = format!("rl:{policy_name}:{subject}");
        let now_ms = now_millis();
        let ttl = policy.bucket_ttl_secs();
        // The script stamps `ts = now` on every invocation regardless of
        // outcome, so `last_refill` for this decision is always `now`.
        let reset_at_epoch_secs = epoch_secs_from_millis(now_ms) + policy.retry_after_secs();

        let outcome = self
            .kv
            .eval_script(
                &TOKEN_BUCKET_SCRIPT,
                &[key.as_str()],
                &[
                    policy.burst_capacity.to_string(),
                    policy.replenish_rate_per_sec.to_string(),
                    policy.requested_tokens_per_call.to_string(),
                    now_ms.to_string(),
                    ttl.to_string(),
                ],
            )
            .await;

        let result = match outcome {
            Ok(values) if values.len() >= 2 => RateLimitResult {
                allowed: values[0] == 1,
                limit: policy.burst_capacity,
                remaining: values[1].max(0) as u32,
                reset_at_epoch_secs,
            },
            Ok(_) | Err(KvError::Redis(_)) | Err(KvError::Timeout(_)) => {
                log::warn!("rate limiter unavailable for policy '{policy_name}', failing open");
                RateLimitResult {
                    allowed: true,
                    limit: policy.burst_capacity,
                    remaining: policy.burst_capacity,
                    reset_at_epoch_secs,
                }
            }
        };

        self.telemetry
            .emit(
                "events.ratelimit",
                RateLimitEvent {
                    request_id: request_id.to_string(),
                    policy: policy_name.to_string(),
                    key: subject.to_string(),
                    allowed: result.allowed,
                    remaining: result.remaining,
                },
            )
            .await;

        result
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn epoch_secs_from_millis(ms: i64) -> u64 {
    (ms / 1000).max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_key_is_policy_and_subject_scoped() {
        let key = format!("rl:{}:{}", "strict", "user:abc");
        assert_eq!(key, "rl:strict:user:abc");
    }
}
