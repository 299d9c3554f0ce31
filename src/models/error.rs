//! Gateway error taxonomy and the two terminal error body shapes.
//!
//! The gateway produces exactly two error body shapes on the wire: RFC 7807
//! `application/problem+json` for gateway-originated failures (routing,
//! auth, circuit-open, internal panics) and the standard response envelope
//! for downstream/principal-caused failures that still need a friendly
//! `code`. `GatewayError` covers the former; envelope error construction
//! lives in [`crate::models::envelope`].

use actix_web::{http::StatusCode, HttpResponse};
use serde::Serialize;
use std::fmt;

use crate::models::envelope::Envelope;

/// Internal error kind, independent of how it is ultimately rendered.
///
/// Mirrors the taxonomy table in the error-handling design directly: each
/// variant names the HTTP status it maps to and nothing else is allowed to
/// invent a new status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayErrorKind {
    RoutingNotFound,
    Blocked,
    Unauthenticated,
    Forbidden,
    RateLimited,
    CircuitOpen,
    UpstreamTimeout,
    UpstreamUnreachable,
    UpstreamError,
    Internal,
}

impl GatewayErrorKind {
    pub fn status_code(self) -> StatusCode {
        match self {
            GatewayErrorKind::RoutingNotFound => StatusCode::NOT_FOUND,
            GatewayErrorKind::Blocked => StatusCode::FORBIDDEN,
            GatewayErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            GatewayErrorKind::Forbidden => StatusCode::FORBIDDEN,
            GatewayErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            GatewayErrorKind::CircuitOpen => StatusCode::SERVICE_UNAVAILABLE,
            GatewayErrorKind::UpstreamTimeout => StatusCode::SERVICE_UNAVAILABLE,
            GatewayErrorKind::UpstreamUnreachable => StatusCode::SERVICE_UNAVAILABLE,
            GatewayErrorKind::UpstreamError => StatusCode::BAD_GATEWAY,
            GatewayErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The `title` used in the RFC 7807 body.
    pub fn title(self) -> &'static str {
        match self {
            GatewayErrorKind::RoutingNotFound => "Route not found",
            GatewayErrorKind::Blocked => "Subject is blocked",
            GatewayErrorKind::Unauthenticated => "Authentication failed",
            GatewayErrorKind::Forbidden => "Insufficient permissions",
            GatewayErrorKind::RateLimited => "Rate limit exceeded",
            GatewayErrorKind::CircuitOpen => "Upstream circuit is open",
            GatewayErrorKind::UpstreamTimeout => "Upstream request timed out",
            GatewayErrorKind::UpstreamUnreachable => "Upstream is unreachable",
            GatewayErrorKind::UpstreamError => "Upstream returned an error",
            GatewayErrorKind::Internal => "Internal gateway error",
        }
    }

    /// The short machine-readable tag used in envelope `code` fields and
    /// telemetry events.
    pub fn code(self) -> &'static str {
        match self {
            GatewayErrorKind::RoutingNotFound => "NOT_FOUND",
            GatewayErrorKind::Blocked => "BLOCKED",
            GatewayErrorKind::Unauthenticated => "UNAUTHENTICATED",
            GatewayErrorKind::Forbidden => "FORBIDDEN",
            GatewayErrorKind::RateLimited => "RATE_LIMIT",
            GatewayErrorKind::CircuitOpen => "CIRCUIT_OPEN",
            GatewayErrorKind::UpstreamTimeout | GatewayErrorKind::UpstreamUnreachable => {
                "UPSTREAM_ERROR"
            }
            GatewayErrorKind::UpstreamError => "UPSTREAM_ERROR",
            GatewayErrorKind::Internal => "ERROR",
        }
    }
}

impl fmt::Display for GatewayErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// A gateway-originated error carrying enough context to render both a
/// problem-details body and a log line.
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {detail}")]
pub struct GatewayError {
    pub kind: GatewayErrorKind,
    pub detail: String,
    pub request_id: String,
    /// Extra fields folded into `error.details` when this failure is
    /// rendered as an envelope instead of problem-details (block scope,
    /// reason, expiry; retry-after seconds; etc).
    pub extra: serde_json::Value,
}

impl GatewayError {
    pub fn new(
        kind: GatewayErrorKind,
        detail: impl Into<String>,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            detail: detail.into(),
            request_id: request_id.into(),
            extra: serde_json::Value::Null,
        }
    }

    pub fn with_extra(mut self, extra: serde_json::Value) -> Self {
        self.extra = extra;
        self
    }

    pub fn to_problem_details(&self) -> ProblemDetails {
        ProblemDetails {
            r#type: self.kind.problem_type().to_string(),
            title: self.kind.title().to_string(),
            status: self.kind.status_code().as_u16(),
            detail: sanitize_detail(&self.detail),
            instance: self.request_id.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl GatewayErrorKind {
    /// The RFC 7807 `type` URI fragment; "about:blank" reserved for the
    /// generic internal case per spec.
    pub fn problem_type(self) -> &'static str {
        match self {
            GatewayErrorKind::Internal => "about:blank",
            GatewayErrorKind::RoutingNotFound => "routing",
            GatewayErrorKind::Blocked => "blocked",
            GatewayErrorKind::Unauthenticated => "authentication",
            GatewayErrorKind::Forbidden => "authorization",
            GatewayErrorKind::RateLimited => "rate-limit",
            GatewayErrorKind::CircuitOpen => "circuit-open",
            GatewayErrorKind::UpstreamTimeout | GatewayErrorKind::UpstreamUnreachable => {
                "upstream-unavailable"
            }
            GatewayErrorKind::UpstreamError => "upstream-error",
        }
    }
}

impl actix_web::error::ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        self.kind.status_code()
    }

    fn error_response(&self) -> HttpResponse {
        // Blocked requests (§4.5) render as the standard envelope, carrying
        // scope/reason/expiry in `error.details`, not problem-details.
        if self.kind == GatewayErrorKind::Blocked {
            let envelope = Envelope::failure(self.status_code().as_u16(), self.extra.clone(), self.request_id.clone(), 0);
            return HttpResponse::build(self.status_code())
                .insert_header(("X-Request-ID", self.request_id.clone()))
                .json(envelope);
        }

        let body = self.to_problem_details();
        let mut builder = HttpResponse::build(self.status_code());
        builder.content_type("application/problem+json");
        builder.insert_header(("X-Request-ID", self.request_id.clone()));
        builder.json(body)
    }
}

/// RFC 7807 problem-details body, per §3 / §4.11 of the design.
#[derive(Debug, Clone, Serialize)]
pub struct ProblemDetails {
    pub r#type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    pub instance: String,
    pub timestamp: String,
}

/// Scrubs a detail string of raw JWTs and email addresses and caps its
/// length at 200 chars (ending in an ellipsis). `None`/empty input becomes
/// the generic fallback message.
pub fn sanitize_detail(detail: &str) -> String {
    if detail.trim().is_empty() {
        return "An error occurred".to_string();
    }

    let bearer_redacted = redact_bearer_tokens(detail);
    let email_redacted = redact_emails(&bearer_redacted);

    if email_redacted.chars().count() > 200 {
        let truncated: String = email_redacted.chars().take(200).collect();
        format!("{truncated}…")
    } else {
        email_redacted
    }
}

fn redact_bearer_tokens(input: &str) -> String {
    // "Bearer eyJ..." -> "Bearer [REDACTED]". A JWT always starts with the
    // base64url-encoded `{"alg":...}` header, i.e. "eyJ", but we redact the
    // whole token regardless of prefix to stay conservative.
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find("Bearer ") {
        out.push_str(&rest[..pos]);
        out.push_str("Bearer [REDACTED]");
        let after = &rest[pos + "Bearer ".len()..];
        let token_len = after
            .find(|c: char| c.is_whitespace())
            .unwrap_or(after.len());
        rest = &after[token_len..];
    }
    out.push_str(rest);
    out
}

fn redact_emails(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for word in input.split_inclusive(' ') {
        let trimmed = word.trim_end();
        let trailing = &word[trimmed.len()..];
        if let Some(at) = trimmed.find('@') {
            if at > 0 && trimmed[at + 1..].contains('.') {
                out.push_str(&trimmed[..at]);
                out.push_str("@[REDACTED]");
                out.push_str(trailing);
                continue;
            }
        }
        out.push_str(word);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_detail_becomes_generic() {
        assert_eq!(sanitize_detail(""), "An error occurred");
        assert_eq!(sanitize_detail("   "), "An error occurred");
    }

    #[test]
    fn redacts_bearer_token() {
        let input = "failed to verify Bearer eyJhbGciOiJIUzI1NiJ9.eyJzdWIi.xyz for request";
        let out = sanitize_detail(input);
        assert!(out.contains("Bearer [REDACTED]"));
        assert!(!out.contains("eyJ"));
    }

    #[test]
    fn redacts_email() {
        let out = sanitize_detail("account user@example.com is locked");
        assert_eq!(out, "account user@[REDACTED] is locked");
    }

    #[test]
    fn truncates_long_detail() {
        let long = "x".repeat(300);
        let out = sanitize_detail(&long);
        assert_eq!(out.chars().count(), 201);
        assert!(out.ends_with('…'));
    }

    #[test]
    fn kind_status_mapping_matches_taxonomy() {
        assert_eq!(GatewayErrorKind::RoutingNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(GatewayErrorKind::Blocked.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            GatewayErrorKind::RateLimited.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            GatewayErrorKind::CircuitOpen.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            GatewayErrorKind::Internal.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}