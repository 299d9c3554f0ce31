//! Administrative API (C15): block-list and login-attempt management,
//! gated by a JWT bearing the configured admin role.
//!
//! These routes sit outside the filter chain entirely — they're not proxied
//! routes, so C1-C10 never see them — but they reuse the same
//! [`JwtVerifier`](crate::services::jwt_verifier::JwtVerifier) the chain
//! uses, just invoked directly instead of through the `Auth` filter.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::services::block_store::BlockScope;
use crate::state::AppState;

fn parse_scope(raw: &str) -> Option<BlockScope> {
    match raw {
        "user" => Some(BlockScope::User),
        "ip" => Some(BlockScope::Ip),
        "key" => Some(BlockScope::Key),
        _ => None,
    }
}

async fn require_admin(req: &HttpRequest, state: &AppState) -> Result<(), HttpResponse> {
    let token = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| HttpResponse::Unauthorized().json(json!({"error": "missing bearer token"})))?;

    let principal = state
        .jwt_verifier
        .verify(token)
        .await
        .map_err(|e| HttpResponse::Unauthorized().json(json!({"error": e.to_string()})))?;

    if !principal.has_role(&state.settings.admin.required_role) {
        return Err(HttpResponse::Forbidden().json(json!({"error": "admin role required"})));
    }
    Ok(())
}

/// Query params for `POST /block/{scope}`, per §4.13/§6:
/// `?id=&reason=&ttlSeconds=`.
#[derive(Debug, Deserialize)]
pub struct BlockQuery {
    pub id: String,
    pub reason: String,
    #[serde(default, rename = "ttlSeconds")]
    pub ttl_seconds: Option<u64>,
}

pub async fn create_block(
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<BlockQuery>,
    state: web::Data<AppState>,
) -> HttpResponse {
    if let Err(response) = require_admin(&req, &state).await {
        return response;
    }
    let Some(scope) = parse_scope(&path) else {
        return HttpResponse::BadRequest().json(json!({"error": "scope must be 'user', 'ip', or 'key'"}));
    };
    match state.block_store.block(scope, &query.id, &query.reason, query.ttl_seconds).await {
        Ok(()) => HttpResponse::Created().json(json!({"blocked": query.id})),
        Err(e) => HttpResponse::ServiceUnavailable().json(json!({"error": e.to_string()})),
    }
}

pub async fn delete_block(
    req: HttpRequest,
    path: web::Path<(String, String)>,
    state: web::Data<AppState>,
) -> HttpResponse {
    if let Err(response) = require_admin(&req, &state).await {
        return response;
    }
    let (scope_raw, id) = path.into_inner();
    let Some(scope) = parse_scope(&scope_raw) else {
        return HttpResponse::BadRequest().json(json!({"error": "scope must be 'user', 'ip', or 'key'"}));
    };
    match state.block_store.unblock(scope, &id).await {
        Ok(removed) => HttpResponse::Ok().json(json!({"unblocked": removed})),
        Err(e) => HttpResponse::ServiceUnavailable().json(json!({"error": e.to_string()})),
    }
}

pub async fn list_blocks(req: HttpRequest, path: web::Path<String>, state: web::Data<AppState>) -> HttpResponse {
    if let Err(response) = require_admin(&req, &state).await {
        return response;
    }
    let Some(scope) = parse_scope(&path) else {
        return HttpResponse::BadRequest().json(json!({"error": "scope must be 'user', 'ip', or 'key'"}));
    };
    match state.block_store.list(scope).await {
        Ok(records) => HttpResponse::Ok().json(records),
        Err(e) => HttpResponse::ServiceUnavailable().json(json!({"error": e.to_string()})),
    }
}

pub async fn get_block(
    req: HttpRequest,
    path: web::Path<(String, String)>,
    state: web::Data<AppState>,
) -> HttpResponse {
    if let Err(response) = require_admin(&req, &state).await {
        return response;
    }
    let (scope_raw, id) = path.into_inner();
    let Some(scope) = parse_scope(&scope_raw) else {
        return HttpResponse::BadRequest().json(json!({"error": "scope must be 'user', 'ip', or 'key'"}));
    };
    match state.block_store.is_blocked(scope, &id).await {
        Ok(status) if status.blocked => HttpResponse::Ok().json(json!({
            "id": id,
            "blocked": true,
            "reason": status.reason,
            "expires_at": status.expires_at,
        })),
        Ok(_) => HttpResponse::NotFound().json(json!({"id": id, "blocked": false})),
        Err(e) => HttpResponse::ServiceUnavailable().json(json!({"error": e.to_string()})),
    }
}

pub async fn get_user_login_attempts(req: HttpRequest, path: web::Path<String>, state: web::Data<AppState>) -> HttpResponse {
    if let Err(response) = require_admin(&req, &state).await {
        return response;
    }
    match state.login_attempts.user_status(&path).await {
        Ok(status) => HttpResponse::Ok().json(status),
        Err(e) => HttpResponse::ServiceUnavailable().json(json!({"error": e.to_string()})),
    }
}

pub async fn get_ip_login_attempts(req: HttpRequest, path: web::Path<String>, state: web::Data<AppState>) -> HttpResponse {
    if let Err(response) = require_admin(&req, &state).await {
        return response;
    }
    match state.login_attempts.ip_status(&path).await {
        Ok(status) => HttpResponse::Ok().json(status),
        Err(e) => HttpResponse::ServiceUnavailable().json(json!({"error": e.to_string()})),
    }
}

pub async fn clear_user_login_attempts(req: HttpRequest, path: web::Path<String>, state: web::Data<AppState>) -> HttpResponse {
    if let Err(response) = require_admin(&req, &state).await {
        return response;
    }
    let user_id = path.into_inner();
    match state.login_attempts.record_success(&user_id, "admin-cleared").await {
        Ok(()) => HttpResponse::Ok().json(json!({"cleared": user_id})),
        Err(e) => HttpResponse::ServiceUnavailable().json(json!({"error": e.to_string()})),
    }
}

/// Mounts the admin API under `prefix` (`Settings::admin.prefix`, default `/admin`).
pub fn configure_admin(prefix: &str) -> impl FnOnce(&mut web::ServiceConfig) + '_ {
    move |cfg: &mut web::ServiceConfig| {
        cfg.service(
            web::scope(prefix)
                .route("/block/{scope}", web::post().to(create_block))
                .route("/block/{scope}", web::get().to(list_blocks))
                .route("/block/{scope}/{id}", web::get().to(get_block))
                .route("/block/{scope}/{id}", web::delete().to(delete_block))
                .route("/login-attempts/user/{id}", web::get().to(get_user_login_attempts))
                .route("/login-attempts/user/{id}", web::delete().to(clear_user_login_attempts))
                .route("/login-attempts/ip/{addr}", web::get().to(get_ip_login_attempts)),
        );
    }
}
