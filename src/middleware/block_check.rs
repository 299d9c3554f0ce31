//! BlockCheck pre-filter (order -80, §4.3/§4.5): consults the block store
//! for the caller's candidate user id (the unverified `sub` claim, since
//! auth hasn't run yet), IP, and API key concurrently, short-circuiting
//! with a 403 envelope on the first hit.
//!
//! Grounded on the teacher's `middleware::rate_limit` pattern of a
//! `Transform`-free, directly-awaited service call; the three scope
//! lookups fan out concurrently via `tokio::join!`, per §9's guidance to
//! implement fan-out with concurrent tasks joined before the decision.

use actix_web::HttpResponse;
use async_trait::async_trait;

use crate::middleware::chain::{PreFilter, PreOutcome};
use crate::models::context::RequestContext;
use crate::models::error::{GatewayError, GatewayErrorKind};
use crate::services::block_store::{BlockScope, BlockStatus, BlockStore};
use crate::services::jwt_verifier::extract_unverified_subject;
use crate::services::kv::KvError;
use crate::state::AppState;

pub struct BlockCheckFilter;

#[async_trait]
impl PreFilter for BlockCheckFilter {
    fn name(&self) -> &'static str {
        "BlockCheck"
    }

    fn order(&self) -> i32 {
        -80
    }

    async fn apply(&self, ctx: &mut RequestContext, state: &AppState) -> PreOutcome {
        let candidate_user = ctx.bearer_token.as_deref().and_then(extract_unverified_subject);
        let ip_id = ctx.client_ip.to_string();
        let key_id = ctx.api_key.clone();

        let (user_result, ip_result, key_result) = tokio::join!(
            check_scope(&state.block_store, BlockScope::User, candidate_user.as_deref()),
            check_scope(&state.block_store, BlockScope::Ip, Some(ip_id.as_str())),
            check_scope(&state.block_store, BlockScope::Key, key_id.as_deref()),
        );

        let hits = [
            (BlockScope::User, candidate_user.as_deref(), user_result),
            (BlockScope::Ip, Some(ip_id.as_str()), ip_result),
            (BlockScope::Key, key_id.as_deref(), key_result),
        ];

        for (scope, id, result) in hits {
            let Some(id) = id else { continue };
            match result {
                Ok(status) if status.blocked => {
                    ctx.status_code = Some(403);
                    ctx.error_kind = Some(GatewayErrorKind::Blocked);
                    return PreOutcome::ShortCircuit(blocked_response(ctx, scope, id, status));
                }
                Ok(_) => {}
                Err(e) => log::warn!("block store unavailable during BlockCheck ({scope:?}): {e}"),
            }
        }

        PreOutcome::Continue
    }
}

async fn check_scope(store: &BlockStore, scope: BlockScope, id: Option<&str>) -> Result<BlockStatus, KvError> {
    match id {
        Some(id) => store.is_blocked(scope, id).await,
        None => Ok(BlockStatus::default()),
    }
}

fn blocked_response(ctx: &RequestContext, scope: BlockScope, id: &str, status: BlockStatus) -> HttpResponse {
    let err = GatewayError::new(
        GatewayErrorKind::Blocked,
        format!("{} {id} is blocked", scope_name(scope)),
        ctx.request_id.clone(),
    )
    .with_extra(serde_json::json!({
        "type": "blocked",
        "scope": scope_name(scope),
        "id": id,
        "reason": status.reason,
        "expires_at": status.expires_at,
    }));
    <GatewayError as actix_web::ResponseError>::error_response(&err)
}

fn scope_name(scope: BlockScope) -> &'static str {
    match scope {
        BlockScope::User => "user",
        BlockScope::Ip => "ip",
        BlockScope::Key => "key",
    }
}

/// Checked a second time right after Auth establishes a verified principal,
/// since §3 invariant 3 requires user-scope blocks to also deny before any
/// downstream call (the pre-auth pass above only had the unverified `sub`).
pub async fn check_principal_block(ctx: &RequestContext, state: &AppState) -> Option<HttpResponse> {
    let principal = ctx.principal.as_ref()?;
    match state.block_store.is_blocked(BlockScope::User, &principal.subject).await {
        Ok(status) if status.blocked => Some(blocked_response(ctx, BlockScope::User, &principal.subject, status)),
        _ => None,
    }
}
