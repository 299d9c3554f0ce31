//! EnvelopeRewrite post-filter (order +50, §4.3/§4.10): wraps a JSON
//! upstream response in the standard success/error envelope.
//!
//! Applies only when the response `Content-Type` begins with
//! `application/json` and the request path isn't in the exclusion list
//! (auth/public/health/docs paths, and any route marked `public`, are
//! returned to the client unwrapped).

use actix_web::body::to_bytes;
use actix_web::http::header::CONTENT_TYPE;
use actix_web::HttpResponse;
use async_trait::async_trait;

use crate::middleware::chain::PostFilter;
use crate::models::context::RequestContext;
use crate::models::envelope::Envelope;
use crate::state::AppState;

const EXCLUDED_PREFIXES: &[&str] = &["/auth/", "/public/", "/health", "/docs", "/swagger"];

pub struct EnvelopeRewriteFilter;

#[async_trait]
impl PostFilter for EnvelopeRewriteFilter {
    fn name(&self) -> &'static str {
        "EnvelopeRewrite"
    }

    fn order(&self) -> i32 {
        50
    }

    async fn apply(&self, ctx: &mut RequestContext, _state: &AppState, response: HttpResponse) -> HttpResponse {
        if is_excluded(&ctx.path) || ctx.matched_route.as_ref().is_some_and(|r| r.public) {
            return response;
        }
        if ctx.body_truncated {
            return response;
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/json"));
        if !is_json {
            return response;
        }

        let status = response.status().as_u16();
        // `application/problem+json` is already a terminal gateway error shape (C12); don't double-wrap it.
        if response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/problem+json"))
        {
            return response;
        }

        let (head_response, body) = response.into_parts();
        let bytes = match to_bytes(body).await {
            Ok(b) => b,
            Err(_) => return head_response.map_into_boxed_body(),
        };

        let parsed: serde_json::Value =
            serde_json::from_slice(&bytes).unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&bytes).into_owned()));

        let envelope = if (200..300).contains(&status) {
            Envelope::success(parsed, ctx.request_id.clone(), ctx.duration_ms())
        } else {
            Envelope::failure(status, parsed, ctx.request_id.clone(), ctx.duration_ms())
        };

        let mut builder = HttpResponse::build(head_response.status());
        for (name, value) in head_response.headers() {
            if name != CONTENT_TYPE {
                builder.insert_header((name.clone(), value.clone()));
            }
        }
        builder.json(envelope)
    }
}

fn is_excluded(path: &str) -> bool {
    EXCLUDED_PREFIXES.iter().any(|p| path.starts_with(p))
}
