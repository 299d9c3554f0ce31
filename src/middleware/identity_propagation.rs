//! Identity Propagation (C13, order +10 "pre-forward", §4.12): injects
//! derived identity headers into the outbound upstream request when a
//! principal exists, and strips any client-supplied `X-User-*`/
//! `X-Gateway-*` headers first so a caller can never spoof them (§3
//! invariant 7, testable property 7).
//!
//! This isn't a registered `PreFilter`/`PostFilter` — it mutates the
//! outbound request headers immediately before the reverse-proxy call
//! rather than the shared `RequestContext`, so `routes::route_table` calls
//! it directly between `CircuitBreaker` and `Forward`.

use actix_web::http::header::HeaderMap;

use crate::models::context::Principal;

const SPOOFABLE_HEADER_PREFIXES: &[&str] = &["x-user-", "x-gateway-"];

/// Removes any inbound `X-User-*`/`X-Gateway-*` headers from `headers` in
/// place, then (if `principal` is present) adds the gateway's own verified
/// set.
pub fn apply(headers: &mut HeaderMap, principal: Option<&Principal>) {
    let spoofed: Vec<_> = headers
        .keys()
        .filter(|name| {
            let lower = name.as_str().to_lowercase();
            SPOOFABLE_HEADER_PREFIXES.iter().any(|p| lower.starts_with(p))
        })
        .cloned()
        .collect();
    for name in spoofed {
        headers.remove(name);
    }

    let Some(principal) = principal else { return };

    insert(headers, "x-user-id", &principal.subject);
    if let Some(email) = &principal.email {
        insert(headers, "x-user-email", email);
    }
    insert(headers, "x-user-authorities", &principal.permissions.join(","));
    insert(headers, "x-user-roles", &principal.roles.join(","));
    insert(headers, "x-gateway-verified", "true");
    insert(
        headers,
        "x-gateway-verification-time",
        &chrono::Utc::now().timestamp_millis().to_string(),
    );
}

fn insert(headers: &mut HeaderMap, name: &'static str, value: &str) {
    if let Ok(header_value) = actix_web::http::header::HeaderValue::from_str(value) {
        headers.insert(actix_web::http::header::HeaderName::from_static(name), header_value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_inbound_spoofed_headers_even_without_principal() {
        let mut headers = HeaderMap::new();
        headers.insert(
            actix_web::http::header::HeaderName::from_static("x-user-id"),
            actix_web::http::header::HeaderValue::from_static("attacker"),
        );
        apply(&mut headers, None);
        assert!(headers.get("x-user-id").is_none());
    }

    #[test]
    fn injects_verified_headers_for_principal() {
        let mut headers = HeaderMap::new();
        let principal = Principal {
            subject: "u-1".to_string(),
            email: Some("u1@example.com".to_string()),
            name: None,
            permissions: vec!["read".to_string()],
            roles: vec!["admin".to_string()],
            raw_token: "token".to_string(),
        };
        apply(&mut headers, Some(&principal));
        assert_eq!(headers.get("x-user-id").unwrap(), "u-1");
        assert_eq!(headers.get("x-gateway-verified").unwrap(), "true");
    }
}
