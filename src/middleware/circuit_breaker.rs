//! CircuitBreaker pre-filter (order -40, §4.3/§4.8): short-circuits with a
//! 503 fallback envelope when the route's breaker is OPEN.
//!
//! The actual state machine lives in
//! [`CircuitBreakerRegistry`](crate::services::circuit_breaker::CircuitBreakerRegistry);
//! this filter only asks permission and, after the route is forwarded,
//! `routes::route_table` reports the outcome back via `record_outcome`.

use async_trait::async_trait;

use crate::middleware::chain::{PreFilter, PreOutcome};
use crate::models::context::RequestContext;
use crate::models::envelope::Envelope;
use crate::models::error::GatewayErrorKind;
use crate::services::circuit_breaker::PermitDecision;
use crate::state::AppState;

pub struct CircuitBreakerFilter;

#[async_trait]
impl PreFilter for CircuitBreakerFilter {
    fn name(&self) -> &'static str {
        "CircuitBreaker"
    }

    fn order(&self) -> i32 {
        -40
    }

    async fn apply(&self, ctx: &mut RequestContext, state: &AppState) -> PreOutcome {
        let Some(route) = ctx.matched_route.clone() else {
            return PreOutcome::Continue;
        };
        let Some(breaker_name) = route.circuit_breaker.clone() else {
            return PreOutcome::Continue;
        };

        match state.circuit_breakers.permit(&breaker_name, route.circuit_breaker_policy).await {
            PermitDecision::Allowed | PermitDecision::AllowedAsProbe => PreOutcome::Continue,
            PermitDecision::Rejected => {
                ctx.status_code = Some(503);
                ctx.error_kind = Some(GatewayErrorKind::CircuitOpen);
                let envelope = Envelope::failure(
                    503,
                    serde_json::json!({"reason": format!("{breaker_name} is temporarily unavailable")}),
                    ctx.request_id.clone(),
                    ctx.duration_ms(),
                );
                PreOutcome::ShortCircuit(actix_web::HttpResponse::ServiceUnavailable().json(envelope))
            }
        }
    }
}
