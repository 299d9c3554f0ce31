//! RateLimit pre-filter (order -50, §4.3/§4.7): consumes tokens from the
//! route's named bucket and stashes the decision on `ctx.rate_limit` for
//! the `RateLimitHeaders` post-filter to read back.
//!
//! Grounded on the teacher's `middleware::rate_limit` for the
//! per-route-policy lookup pattern, generalized onto the atomic Redis
//! script in [`RateLimiter`](crate::services::rate_limiter::RateLimiter)
//! instead of an in-process bucket map.

use async_trait::async_trait;

use crate::middleware::chain::{PreFilter, PreOutcome};
use crate::models::context::{RateLimitDecision, RequestContext};
use crate::models::envelope::Envelope;
use crate::state::AppState;

pub struct RateLimitFilter;

#[async_trait]
impl PreFilter for RateLimitFilter {
    fn name(&self) -> &'static str {
        "RateLimit"
    }

    fn order(&self) -> i32 {
        -50
    }

    async fn apply(&self, ctx: &mut RequestContext, state: &AppState) -> PreOutcome {
        let Some(route) = ctx.matched_route.clone() else {
            return PreOutcome::Continue;
        };
        let Some(policy_name) = route.rate_limit_policy.clone() else {
            return PreOutcome::Continue;
        };
        let Some(policy) = state.rate_limit_policies.get(&policy_name).copied() else {
            log::warn!("route '{}' references unknown rate-limit policy '{policy_name}'", route.id);
            return PreOutcome::Continue;
        };

        let subject = ctx.rate_limit_subject();
        let result = state
            .rate_limiter
            .check(&ctx.request_id, &policy_name, &policy, &subject)
            .await;

        ctx.rate_limit = Some(RateLimitDecision {
            limit: result.limit,
            remaining: result.remaining,
            reset_at_epoch_secs: result.reset_at_epoch_secs as i64,
        });

        if result.allowed {
            return PreOutcome::Continue;
        }

        ctx.status_code = Some(429);
        ctx.error_kind = Some(crate::models::error::GatewayErrorKind::RateLimited);
        let envelope = Envelope::failure(
            429,
            serde_json::Value::Null,
            ctx.request_id.clone(),
            ctx.duration_ms(),
        );
        let retry_after = policy.retry_after_secs().max(1);
        let response = actix_web::HttpResponse::TooManyRequests()
            .insert_header(("Retry-After", retry_after.to_string()))
            .json(envelope);
        PreOutcome::ShortCircuit(response)
    }
}
