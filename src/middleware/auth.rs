//! Auth pre-filter (order -70, §4.3/§4.4): verifies the bearer token via
//! C3, populates `ctx.principal`, and enforces the matched route's required
//! roles. Public routes and configured public-prefix paths bypass this
//! filter entirely.
//!
//! Grounded on the teacher's `middleware::auth` for the bearer-token
//! extraction and missing-header handling, generalized from a single static
//! HMAC secret to the JWKS-backed [`JwtVerifier`](crate::services::jwt_verifier::JwtVerifier).

use async_trait::async_trait;
use log::info;

use crate::middleware::block_check::check_principal_block;
use crate::middleware::chain::{PreFilter, PreOutcome};
use crate::models::context::RequestContext;
use crate::models::error::{GatewayError, GatewayErrorKind};
use crate::services::telemetry::AuthEvent;
use crate::state::AppState;

/// True if `path` falls under one of the globally public prefixes
/// (`Settings::jwt.public_prefixes`), independent of any per-route `public`
/// flag.
fn is_public_prefix(path: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|p| path.starts_with(p.as_str()))
}

pub struct AuthFilter;

#[async_trait]
impl PreFilter for AuthFilter {
    fn name(&self) -> &'static str {
        "Auth"
    }

    fn order(&self) -> i32 {
        -70
    }

    async fn apply(&self, ctx: &mut RequestContext, state: &AppState) -> PreOutcome {
        if is_public_prefix(&ctx.path, &state.settings.jwt.public_prefixes) {
            return PreOutcome::Continue;
        }

        let Some(route) = ctx.matched_route.clone() else {
            return PreOutcome::Continue;
        };

        if !route.requires_auth() {
            return PreOutcome::Continue;
        }

        let Some(token) = ctx.bearer_token.clone() else {
            return self.unauthenticated(ctx, state, "missing Authorization header").await;
        };

        match state.jwt_verifier.verify(&token).await {
            Ok(principal) => {
                if !route.required_roles.is_empty() && !route.required_roles.iter().any(|r| principal.has_role(r)) {
                    ctx.status_code = Some(403);
                    ctx.error_kind = Some(GatewayErrorKind::Forbidden);
                    let err = GatewayError::new(
                        GatewayErrorKind::Forbidden,
                        "principal lacks required role for this route",
                        ctx.request_id.clone(),
                    );
                    return PreOutcome::ShortCircuit(<GatewayError as actix_web::ResponseError>::error_response(&err));
                }

                ctx.principal = Some(principal);
                state
                    .telemetry
                    .emit(
                        "events.auth",
                        AuthEvent {
                            request_id: ctx.request_id.clone(),
                            outcome: "success",
                            subject: ctx.principal.as_ref().map(|p| p.subject.clone()),
                            reason: None,
                        },
                    )
                    .await;

                if let Some(blocked_response) = check_principal_block(ctx, state).await {
                    ctx.status_code = Some(403);
                    ctx.error_kind = Some(GatewayErrorKind::Blocked);
                    return PreOutcome::ShortCircuit(blocked_response);
                }

                PreOutcome::Continue
            }
            Err(e) => {
                info!("jwt verification failed: {e}");
                self.unauthenticated(ctx, state, &e.to_string()).await
            }
        }
    }
}

impl AuthFilter {
    async fn unauthenticated(&self, ctx: &mut RequestContext, state: &AppState, detail: &str) -> PreOutcome {
        ctx.status_code = Some(401);
        ctx.error_kind = Some(GatewayErrorKind::Unauthenticated);
        state
            .telemetry
            .emit(
                "events.auth",
                AuthEvent {
                    request_id: ctx.request_id.clone(),
                    outcome: "failure",
                    subject: None,
                    reason: Some(detail.to_string()),
                },
            )
            .await;
        let err = GatewayError::new(GatewayErrorKind::Unauthenticated, detail, ctx.request_id.clone());
        PreOutcome::ShortCircuit(<GatewayError as actix_web::ResponseError>::error_response(&err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_prefix_matches_configured_list() {
        let prefixes = vec!["/public/".to_string(), "/auth/".to_string(), "/health".to_string()];
        assert!(is_public_prefix("/public/health", &prefixes));
        assert!(is_public_prefix("/auth/login", &prefixes));
        assert!(!is_public_prefix("/api/users/profile", &prefixes));
    }
}
