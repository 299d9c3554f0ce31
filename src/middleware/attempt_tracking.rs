//! AttemptTracking post-filter (order -60, §4.3/§4.6): records a failed
//! login attempt when the response is 401, or clears the counters on a
//! successful authenticated call.
//!
//! The pre-phase described in §4.3's table is a no-op here (the Auth filter
//! already ran); all of this filter's behavior happens post-response.

use async_trait::async_trait;

use crate::middleware::chain::PostFilter;
use crate::models::context::RequestContext;
use crate::services::jwt_verifier::extract_unverified_subject;
use crate::state::AppState;

pub struct AttemptTrackingFilter;

#[async_trait]
impl PostFilter for AttemptTrackingFilter {
    fn name(&self) -> &'static str {
        "AttemptTracking"
    }

    fn order(&self) -> i32 {
        -60
    }

    async fn apply(&self, ctx: &mut RequestContext, state: &AppState, response: actix_web::HttpResponse) -> actix_web::HttpResponse {
        let Some(route) = ctx.matched_route.clone() else {
            return response;
        };
        if !route.requires_auth() {
            return response;
        }

        let ip = ctx.client_ip.to_string();
        let status = ctx.status_code.unwrap_or(response.status().as_u16());

        if status == 401 {
            let subject = ctx
                .bearer_token
                .as_deref()
                .and_then(extract_unverified_subject)
                .unwrap_or_else(|| format!("anonymous:{ip}"));
            if let Err(e) = state.login_attempts.record_failure(&subject, &ip).await {
                log::warn!("failed to record login attempt: {e}");
            }
        } else if (200..300).contains(&status) {
            if let Some(principal) = &ctx.principal {
                if let Err(e) = state.login_attempts.record_success(&principal.subject, &ip).await {
                    log::warn!("failed to reset login attempts: {e}");
                }
            }
        }

        response
    }
}
