//! The gateway's single catch-all handler (C8 route resolution plus the C9
//! filter-chain pipeline around C10 forwarding), mounted at `/{tail:.*}` for
//! every method in `main`.
//!
//! Grounded on the teacher's `services::http::RouteHandler::handle_request`
//! for the overall request shape (extract context, match route, forward,
//! build response) but the middle is now entirely the registered filter
//! chain instead of inline rate-limit/retry/load-balancer calls.

use std::net::IpAddr;
use std::time::Instant;

use actix_web::{web, HttpRequest, HttpResponse};
use uuid::Uuid;

use crate::middleware::chain::panic_to_problem_details;
use crate::middleware::identity_propagation;
use crate::models::context::RequestContext;
use crate::models::error::{GatewayError, GatewayErrorKind};
use crate::services::telemetry::RequestStartEvent;
use crate::state::AppState;
use crate::utils::ip::resolve_client_ip;
use crate::utils::path::{build_upstream_url, is_valid_request_id};

/// Fallback upstream timeout when a route doesn't set its own.
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;

/// `/{tail:.*}` handler for every HTTP method. Builds the request ID and
/// client IP inline (order -100/-90, §4.3) on this task, before handing the
/// rest of the pipeline to a spawned task so a handler panic is caught at
/// the task join boundary. Resolving request ID, client IP, method, and
/// path here (rather than inside the spawned task) lets the panic path
/// build a fallback [`RequestContext`] and still run post-filters, per the
/// guarantee that post-filters run on every exit path (§4.3).
pub async fn gateway_handler(req: HttpRequest, body: web::Bytes, state: web::Data<AppState>) -> HttpResponse {
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| is_valid_request_id(v))
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let socket_peer = req
        .peer_addr()
        .map(|addr| addr.ip())
        .unwrap_or_else(|| IpAddr::from([0, 0, 0, 0]));
    let client_ip = resolve_client_ip(
        header_str(&req, "x-forwarded-for"),
        header_str(&req, "x-real-ip"),
        header_str(&req, "cf-connecting-ip"),
        socket_peer,
        &state.private_ranges,
    );
    let method = req.method().as_str().to_string();
    let path = req.path().to_string();

    state
        .telemetry
        .emit(
            "logs.gateway",
            RequestStartEvent::now(request_id.clone(), method.clone(), path.clone(), client_ip.to_string()),
        )
        .await;

    let state_for_task = state.clone();
    let req_for_task = req.clone();
    let request_id_for_panic = request_id.clone();
    let method_for_panic = method.clone();
    let path_for_panic = path.clone();

    let handle = tokio::spawn(async move {
        run_pipeline(req_for_task, body, state_for_task, request_id, client_ip, method, path).await
    });

    match handle.await {
        Ok(response) => response,
        Err(_join_error) => {
            let mut fallback_ctx = RequestContext::new(request_id_for_panic.clone(), client_ip, method_for_panic, path_for_panic);
            fallback_ctx.status_code = Some(500);
            fallback_ctx.error_kind = Some(GatewayErrorKind::Internal);
            let response = panic_to_problem_details(&request_id_for_panic);
            state.chain.run_post(&mut fallback_ctx, &state, response).await
        }
    }
}

async fn run_pipeline(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
    request_id: String,
    client_ip: IpAddr,
    method: String,
    path: String,
) -> HttpResponse {
    let mut ctx = RequestContext::new(request_id.clone(), client_ip, method.clone(), path.clone());
    ctx.bearer_token = extract_bearer_token(&req);
    ctx.api_key = header_str(&req, "x-api-key").map(str::to_string);

    let route_match = state.routes.find_match(&method, &path);
    ctx.matched_route = route_match.as_ref().map(|(route, _)| route.clone());

    let response = match state.chain.run_pre(&mut ctx, &state).await {
        Err(short_circuit) => short_circuit,
        Ok(()) => match route_match {
            None => {
                ctx.status_code = Some(404);
                ctx.error_kind = Some(GatewayErrorKind::RoutingNotFound);
                let err = GatewayError::new(GatewayErrorKind::RoutingNotFound, format!("no route matches {method} {path}"), request_id.clone());
                <GatewayError as actix_web::ResponseError>::error_response(&err)
            }
            Some((route, forwarded_path)) => forward_to_upstream(&req, body, &state, &mut ctx, &route, &forwarded_path).await,
        },
    };

    let mut response = state.chain.run_post(&mut ctx, &state, response).await;
    response
        .headers_mut()
        .insert(
            actix_web::http::header::HeaderName::from_static("x-request-id"),
            actix_web::http::header::HeaderValue::from_str(&ctx.request_id).unwrap_or_else(|_| actix_web::http::header::HeaderValue::from_static("invalid")),
        );
    response
}

async fn forward_to_upstream(
    req: &HttpRequest,
    body: web::Bytes,
    state: &web::Data<AppState>,
    ctx: &mut RequestContext,
    route: &std::sync::Arc<crate::models::route::Route>,
    forwarded_path: &str,
) -> HttpResponse {
    let target_url = build_upstream_url(&route.upstream, forwarded_path, req.uri().query());
    let timeout_secs = route.upstream_timeout_secs.unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_SECS);

    let mut headers = req.headers().clone();
    identity_propagation::apply(&mut headers, ctx.principal.as_ref());

    let connection_info = req.connection_info().clone();
    let forwarded_proto = connection_info.scheme().to_string();
    let forwarded_host = connection_info.host().to_string();

    let call_started = Instant::now();
    let result = state
        .proxy
        .forward(
            req.method(),
            &target_url,
            &headers,
            body.to_vec(),
            ctx.client_ip,
            &forwarded_proto,
            &forwarded_host,
            timeout_secs,
            &ctx.request_id,
        )
        .await;
    let call_duration = call_started.elapsed();

    if let Some(breaker_name) = &route.circuit_breaker {
        let failed = match &result {
            Ok(upstream) => upstream.status >= 500,
            Err(_) => true,
        };
        state.circuit_breakers.record_outcome(breaker_name, failed, call_duration).await;
    }

    match result {
        Ok(upstream) => {
            ctx.status_code = Some(upstream.status);
            ctx.bytes_out = upstream.body.len() as u64;
            ctx.body_truncated = upstream.body_truncated;
            let status = actix_web::http::StatusCode::from_u16(upstream.status).unwrap_or(actix_web::http::StatusCode::BAD_GATEWAY);
            let mut builder = HttpResponse::build(status);
            for (name, value) in &upstream.headers {
                builder.insert_header((name.as_str(), value.as_str()));
            }
            builder.body(upstream.body)
        }
        Err(gateway_error) => {
            ctx.status_code = Some(gateway_error.kind.status_code().as_u16());
            ctx.error_kind = Some(gateway_error.kind);
            <GatewayError as actix_web::ResponseError>::error_response(&gateway_error)
        }
    }
}

fn header_str<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
    req.headers().get(name).and_then(|v| v.to_str().ok())
}

fn extract_bearer_token(req: &HttpRequest) -> Option<String> {
    let value = header_str(req, "authorization")?;
    value.strip_prefix("Bearer ").map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_timeout_default_matches_fallback() {
        assert_eq!(DEFAULT_UPSTREAM_TIMEOUT_SECS, 30);
    }
}
