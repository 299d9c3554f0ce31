//! Route configuration: the immutable binding of an inbound predicate to an
//! upstream URI plus filter parameters (§3, §4.2).
//!
//! Grounded on the teacher's `models::router::Router`, trimmed of the
//! load-balancing/backend-weight/retry/AI-policy fields that sat outside
//! this core and given the fields the gateway's filter chain actually reads:
//! method + glob predicate, prefix-strip count, and references to a named
//! rate-limit policy and circuit breaker.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One named token-bucket configuration, referenced by `Route::rate_limit_policy`.
///
/// The four built-in defaults from §3 are registered by
/// [`RateLimitPolicy::builtin_defaults`] and are always available even if a
/// config file doesn't declare `rate_limit_policies` at all.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    pub replenish_rate_per_sec: u32,
    pub burst_capacity: u32,
    pub requested_tokens_per_call: u32,
}

impl RateLimitPolicy {
    pub fn builtin_defaults() -> HashMap<String, RateLimitPolicy> {
        let mut map = HashMap::new();
        map.insert(
            "default".to_string(),
            RateLimitPolicy {
                replenish_rate_per_sec: 1,
                burst_capacity: 3,
                requested_tokens_per_call: 1,
            },
        );
        map.insert(
            "lenient".to_string(),
            RateLimitPolicy {
                replenish_rate_per_sec: 20,
                burst_capacity: 40,
                requested_tokens_per_call: 1,
            },
        );
        map.insert(
            "strict".to_string(),
            RateLimitPolicy {
                replenish_rate_per_sec: 5,
                burst_capacity: 10,
                requested_tokens_per_call: 2,
            },
        );
        map.insert(
            "admin".to_string(),
            RateLimitPolicy {
                replenish_rate_per_sec: 15,
                burst_capacity: 30,
                requested_tokens_per_call: 1,
            },
        );
        map
    }

    /// TTL (seconds) for the bucket's KV entry, per §3: `ceil(burst/replenish) * 2`.
    pub fn bucket_ttl_secs(&self) -> u64 {
        let per_token = (self.burst_capacity as f64 / self.replenish_rate_per_sec.max(1) as f64).ceil();
        (per_token as u64).max(1) * 2
    }

    /// Seconds until `requested_tokens_per_call` tokens are available again,
    /// per §4.6: `ceil(requested_tokens / replenish)`. A policy that never
    /// replenishes falls back to the bucket's own TTL rather than dividing
    /// by zero.
    pub fn retry_after_secs(&self) -> u64 {
        if self.replenish_rate_per_sec == 0 {
            return self.bucket_ttl_secs();
        }
        (self.requested_tokens_per_call as f64 / self.replenish_rate_per_sec as f64).ceil() as u64
    }
}

/// Per-route circuit-breaker tuning; falls back to the process-wide defaults
/// in `CircuitBreakerPolicy::default()` (§4.8) when a route doesn't override
/// anything.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerPolicy {
    pub window_size: usize,
    pub minimum_samples: usize,
    pub failure_rate_threshold: f64,
    pub slow_call_rate_threshold: f64,
    pub slow_call_duration_ms: u64,
    pub wait_duration_secs: u64,
    pub half_open_probe_count: u32,
}

impl Default for CircuitBreakerPolicy {
    fn default() -> Self {
        Self {
            window_size: 20,
            minimum_samples: 10,
            failure_rate_threshold: 0.5,
            slow_call_rate_threshold: 0.5,
            slow_call_duration_ms: 3_000,
            wait_duration_secs: 10,
            half_open_probe_count: 3,
        }
    }
}

/// An immutable route: predicate (method + path pattern) plus upstream and
/// per-route filter parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub id: String,

    /// Allowed methods; empty means "any method".
    #[serde(default)]
    pub methods: Vec<String>,

    /// Path pattern: static segments, `{param}` placeholders, and an
    /// optional trailing `**` wildcard. See `utils::route_matcher`.
    pub path: String,

    /// Fixed upstream origin, e.g. `http://user-service:8080`.
    pub upstream: String,

    /// Number of leading path segments stripped before forwarding.
    #[serde(default)]
    pub strip_prefix_segments: usize,

    /// Whether the route is public (bypasses C3 entirely).
    #[serde(default)]
    pub public: bool,

    /// Whether C3 must populate a verified principal before C10 is called.
    /// Ignored (treated as `false`) when `public` is `true`.
    #[serde(default)]
    pub auth_required: bool,

    /// Roles the principal must hold, checked after successful auth; empty
    /// means "any authenticated principal is sufficient".
    #[serde(default)]
    pub required_roles: Vec<String>,

    /// Name of the rate-limit policy to apply; `None` disables rate limiting
    /// for this route.
    #[serde(default)]
    pub rate_limit_policy: Option<String>,

    /// Name of the circuit breaker this route participates in. Routes
    /// sharing a name share breaker state; `None` disables circuit breaking.
    #[serde(default)]
    pub circuit_breaker: Option<String>,

    #[serde(default)]
    pub circuit_breaker_policy: Option<CircuitBreakerPolicy>,

    /// Per-route upstream call timeout; falls back to the gateway default.
    #[serde(default)]
    pub upstream_timeout_secs: Option<u64>,
}

impl Route {
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("route id must not be empty".to_string());
        }
        if !self.path.starts_with('/') {
            return Err(format!("route '{}': path must start with '/'", self.id));
        }
        if !self.upstream.starts_with("http://") && !self.upstream.starts_with("https://") {
            return Err(format!(
                "route '{}': upstream must start with http:// or https://",
                self.id
            ));
        }
        for m in &self.methods {
            if actix_web::http::Method::from_bytes(m.as_bytes()).is_err() {
                return Err(format!("route '{}': invalid HTTP method '{}'", self.id, m));
            }
        }
        if self.public && self.auth_required {
            return Err(format!(
                "route '{}': a public route cannot also require auth",
                self.id
            ));
        }
        Ok(())
    }

    pub fn requires_auth(&self) -> bool {
        !self.public && self.auth_required
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_route() -> Route {
        Route {
            id: "users".to_string(),
            methods: vec!["GET".to_string()],
            path: "/api/users/{id}".to_string(),
            upstream: "http://user-service:8080".to_string(),
            strip_prefix_segments: 1,
            public: false,
            auth_required: true,
            required_roles: vec![],
            rate_limit_policy: Some("default".to_string()),
            circuit_breaker: Some("user-service".to_string()),
            circuit_breaker_policy: None,
            upstream_timeout_secs: None,
        }
    }

    #[test]
    fn valid_route_passes() {
        assert!(base_route().validate().is_ok());
    }

    #[test]
    fn path_must_start_with_slash() {
        let mut r = base_route();
        r.path = "api/users".to_string();
        assert!(r.validate().is_err());
    }

    #[test]
    fn upstream_must_have_scheme() {
        let mut r = base_route();
        r.upstream = "user-service:8080".to_string();
        assert!(r.validate().is_err());
    }

    #[test]
    fn public_and_auth_required_conflict() {
        let mut r = base_route();
        r.public = true;
        assert!(r.validate().is_err());
    }

    #[test]
    fn builtin_rate_limit_defaults_match_spec() {
        let defaults = RateLimitPolicy::builtin_defaults();
        let default = defaults.get("default").unwrap();
        assert_eq!(default.replenish_rate_per_sec, 1);
        assert_eq!(default.burst_capacity, 3);
        let strict = defaults.get("strict").unwrap();
        assert_eq!(strict.replenish_rate_per_sec, 5);
        assert_eq!(strict.burst_capacity, 10);
        assert_eq!(strict.requested_tokens_per_call, 2);
    }
}
