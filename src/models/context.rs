//! The per-request context threaded through the filter chain.
//!
//! One `RequestContext` is built per inbound request by the HTTP listener
//! (`routes::route_table`) and passed by `&mut` reference through every
//! filter. It is never shared across requests and carries no interior
//! mutability beyond what a single task needs.

use crate::models::route::Route;
use std::sync::Arc;
use std::time::Instant;

/// The verified caller identity derived from a JWT, set by the `Auth`
/// filter when verification succeeds.
#[derive(Debug, Clone)]
pub struct Principal {
    pub subject: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub permissions: Vec<String>,
    pub roles: Vec<String>,
    /// The raw, unmodified bearer token, propagated unchanged downstream.
    pub raw_token: String,
}

impl Principal {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Per-request rate-limit decision, stashed by the `RateLimit` filter for
/// the `RateLimitHeaders` post-filter to read back.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitDecision {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at_epoch_secs: i64,
}

/// Everything the filter chain and telemetry need to know about one
/// in-flight request.
pub struct RequestContext {
    pub request_id: String,
    pub start_time: Instant,
    pub client_ip: std::net::IpAddr,
    pub method: String,
    pub path: String,
    pub matched_route: Option<Arc<Route>>,
    /// Raw `Authorization: Bearer <token>` value, extracted before any
    /// client-supplied `X-User-*` headers are stripped (§4.12).
    pub bearer_token: Option<String>,
    /// Raw `X-Api-Key` header value, if present, consulted by `BlockCheck`'s
    /// key-scope lookup (§4.5).
    pub api_key: Option<String>,
    pub principal: Option<Principal>,
    pub status_code: Option<u16>,
    pub bytes_out: u64,
    pub error_kind: Option<crate::models::error::GatewayErrorKind>,
    pub rate_limit: Option<RateLimitDecision>,
    /// Set by the reverse proxy when the upstream body exceeded the
    /// buffering cap; `EnvelopeRewrite` must not attempt to JSON-parse it.
    pub body_truncated: bool,
}

impl RequestContext {
    pub fn new(request_id: String, client_ip: std::net::IpAddr, method: String, path: String) -> Self {
        Self {
            request_id,
            start_time: Instant::now(),
            client_ip,
            method,
            path,
            matched_route: None,
            bearer_token: None,
            api_key: None,
            principal: None,
            status_code: None,
            bytes_out: 0,
            error_kind: None,
            rate_limit: None,
            body_truncated: false,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// The bucket subject used by the rate limiter and login-attempt
    /// tracker: the authenticated subject if present, else the client IP.
    pub fn rate_limit_subject(&self) -> String {
        match &self.principal {
            Some(p) => format!("user:{}", p.subject),
            None => format!("ip:{}", self.client_ip),
        }
    }
}
