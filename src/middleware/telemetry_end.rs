//! Telemetry-End post-filter (order +90, §4.3): emits the access-log event
//! to `logs.gateway` once the final status is known. Runs last among the
//! post-filters so it observes whatever `EnvelopeRewrite`/`RateLimitHeaders`
//! decided, though its own payload only needs the status code.

use async_trait::async_trait;

use crate::middleware::chain::PostFilter;
use crate::models::context::RequestContext;
use crate::services::telemetry::AccessEvent;
use crate::state::AppState;

pub struct TelemetryEndFilter;

#[async_trait]
impl PostFilter for TelemetryEndFilter {
    fn name(&self) -> &'static str {
        "Telemetry-End"
    }

    fn order(&self) -> i32 {
        90
    }

    async fn apply(&self, ctx: &mut RequestContext, state: &AppState, response: actix_web::HttpResponse) -> actix_web::HttpResponse {
        let status = ctx.status_code.unwrap_or_else(|| response.status().as_u16());
        state
            .telemetry
            .emit(
                "logs.gateway",
                AccessEvent::now(
                    ctx.request_id.clone(),
                    ctx.method.clone(),
                    ctx.path.clone(),
                    Some(status),
                    ctx.duration_ms(),
                    ctx.client_ip.to_string(),
                    ctx.error_kind.map(|k| k.code()),
                ),
            )
            .await;
        response
    }
}
