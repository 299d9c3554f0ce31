//! RateLimitHeaders post-filter (order +60, §4.3/§4.7): writes
//! `X-RateLimit-Limit`/`X-RateLimit-Remaining`/`X-RateLimit-Reset` from the
//! decision the `RateLimit` pre-filter stashed on the context. A no-op if
//! the route had no rate-limit policy.

use async_trait::async_trait;

use crate::middleware::chain::PostFilter;
use crate::models::context::RequestContext;
use crate::state::AppState;

pub struct RateLimitHeadersFilter;

#[async_trait]
impl PostFilter for RateLimitHeadersFilter {
    fn name(&self) -> &'static str {
        "RateLimitHeaders"
    }

    fn order(&self) -> i32 {
        60
    }

    async fn apply(&self, ctx: &mut RequestContext, _state: &AppState, mut response: actix_web::HttpResponse) -> actix_web::HttpResponse {
        if let Some(decision) = ctx.rate_limit {
            let headers = response.headers_mut();
            headers.insert(
                actix_web::http::header::HeaderName::from_static("x-ratelimit-limit"),
                actix_web::http::header::HeaderValue::from_str(&decision.limit.to_string()).unwrap(),
            );
            headers.insert(
                actix_web::http::header::HeaderName::from_static("x-ratelimit-remaining"),
                actix_web::http::header::HeaderValue::from_str(&decision.remaining.to_string()).unwrap(),
            );
            headers.insert(
                actix_web::http::header::HeaderName::from_static("x-ratelimit-reset"),
                actix_web::http::header::HeaderValue::from_str(&decision.reset_at_epoch_secs.to_string()).unwrap(),
            );
        }
        response
    }
}
