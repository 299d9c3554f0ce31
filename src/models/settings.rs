//! Top-level gateway configuration, loaded from `config.json` by
//! `config::settings::load_settings` and validated by
//! `config::validation::ConfigValidator` before the server binds a socket.

use crate::models::route::{CircuitBreakerPolicy, RateLimitPolicy, Route};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// JWT verification configuration (C3).
///
/// In production, `test_mode = false` forces RS256 and a JWKS fetch; setting
/// `test_mode = true` switches to HS256 against `hmac_secret`, matching the
/// "pluggable test key" requirement — production deployments must never
/// flip this flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtSettings {
    /// Token issuer; also used to derive the JWKS/authorize/token/userinfo
    /// URLs (`<issuer>.well-known/jwks.json`, etc).
    pub issuer: String,

    /// Expected `aud` claim value.
    pub audience: String,

    /// Explicit JWKS URL override; defaults to `<issuer>.well-known/jwks.json`.
    #[serde(default)]
    pub jwks_url: Option<String>,

    /// JWKS fetch timeout in milliseconds; default 3000 per §5.
    #[serde(default = "default_jwks_timeout_ms")]
    pub jwks_timeout_ms: u64,

    #[serde(default)]
    pub test_mode: bool,

    /// HMAC secret used only when `test_mode` is set.
    #[serde(default)]
    pub hmac_secret: Option<String>,

    /// Path prefixes that bypass C3 entirely (in addition to any route
    /// marked `public`).
    #[serde(default = "default_public_prefixes")]
    pub public_prefixes: Vec<String>,
}

fn default_jwks_timeout_ms() -> u64 {
    3_000
}

fn default_public_prefixes() -> Vec<String> {
    vec![
        "/public/".to_string(),
        "/auth/".to_string(),
        "/health".to_string(),
    ]
}

impl Default for JwtSettings {
    fn default() -> Self {
        Self {
            issuer: "https://issuer.invalid/".to_string(),
            audience: "api-clients".to_string(),
            jwks_url: None,
            jwks_timeout_ms: default_jwks_timeout_ms(),
            test_mode: false,
            hmac_secret: None,
            public_prefixes: default_public_prefixes(),
        }
    }
}

impl JwtSettings {
    pub fn jwks_url(&self) -> String {
        self.jwks_url
            .clone()
            .unwrap_or_else(|| format!("{}.well-known/jwks.json", self.issuer))
    }
}

/// Key-value backend (C1) connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisSettings {
    pub url: String,
    #[serde(default = "default_kv_timeout_ms")]
    pub command_timeout_ms: u64,
}

fn default_kv_timeout_ms() -> u64 {
    200
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            command_timeout_ms: default_kv_timeout_ms(),
        }
    }
}

/// Message bus (C2) settings. Telemetry is always best-effort; when
/// `brokers` is absent the emitter runs with a no-op producer rather than
/// failing startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub brokers: Option<String>,
    #[serde(default = "default_telemetry_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_access_topic")]
    pub access_topic: String,
    #[serde(default = "default_auth_topic")]
    pub auth_topic: String,
    #[serde(default = "default_ratelimit_topic")]
    pub ratelimit_topic: String,
    #[serde(default = "default_circuitbreaker_topic")]
    pub circuitbreaker_topic: String,
}

fn default_telemetry_queue_capacity() -> usize {
    10_000
}
fn default_access_topic() -> String {
    "logs.gateway".to_string()
}
fn default_auth_topic() -> String {
    "events.auth".to_string()
}
fn default_ratelimit_topic() -> String {
    "events.ratelimit".to_string()
}
fn default_circuitbreaker_topic() -> String {
    "events.circuitbreaker".to_string()
}

/// CORS configuration (§6); `OPTIONS` preflight always short-circuits
/// before auth regardless of these settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsSettings {
    pub allowed_origins: Vec<String>,
    #[serde(default)]
    pub allow_credentials: bool,
}

impl Default for CorsSettings {
    fn default() -> Self {
        Self {
            allowed_origins: vec![],
            allow_credentials: false,
        }
    }
}

impl CorsSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.allow_credentials && self.allowed_origins.iter().any(|o| o == "*") {
            return Err("CORS: wildcard origin is forbidden when allow_credentials is true".to_string());
        }
        Ok(())
    }
}

/// Admin API (C15) surface settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminSettings {
    #[serde(default = "default_admin_prefix")]
    pub prefix: String,
    #[serde(default = "default_admin_role")]
    pub required_role: String,
}

fn default_admin_prefix() -> String {
    "/admin".to_string()
}
fn default_admin_role() -> String {
    "admin".to_string()
}

impl Default for AdminSettings {
    fn default() -> Self {
        Self {
            prefix: default_admin_prefix(),
            required_role: default_admin_role(),
        }
    }
}

/// Trusted-proxy IP extraction settings for the client-IP resolution rule
/// in §4.7 / §3 (Request Context).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustedProxySettings {
    /// RFC1918-style CIDR ranges excluded from forwarded-header trust;
    /// defaults to the three private ranges plus loopback.
    #[serde(default = "default_private_ranges")]
    pub private_ranges: Vec<String>,
}

fn default_private_ranges() -> Vec<String> {
    vec![
        "10.0.0.0/8".to_string(),
        "172.16.0.0/12".to_string(),
        "192.168.0.0/16".to_string(),
        "127.0.0.0/8".to_string(),
    ]
}

impl Default for TrustedProxySettings {
    fn default() -> Self {
        Self {
            private_ranges: default_private_ranges(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub version: u8,

    pub jwt: JwtSettings,

    #[serde(default)]
    pub redis: RedisSettings,

    #[serde(default)]
    pub telemetry: TelemetrySettings,

    #[serde(default)]
    pub cors: CorsSettings,

    #[serde(default)]
    pub admin: AdminSettings,

    #[serde(default)]
    pub trusted_proxy: TrustedProxySettings,

    #[serde(default)]
    pub circuit_breaker_defaults: CircuitBreakerPolicy,

    /// Named rate-limit policies, merged on top of the four built-in
    /// defaults (a config-declared policy with the same name overrides it).
    #[serde(default)]
    pub rate_limit_policies: HashMap<String, RateLimitPolicy>,

    pub routes: Vec<Route>,
}

impl Settings {
    pub fn resolved_rate_limit_policies(&self) -> HashMap<String, RateLimitPolicy> {
        let mut map = RateLimitPolicy::builtin_defaults();
        map.extend(self.rate_limit_policies.clone());
        map
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.jwt.test_mode && self.jwt.hmac_secret.as_deref().unwrap_or_default().len() < 16 {
            return Err(
                "jwt.hmac_secret must be at least 16 characters when test_mode is enabled".to_string(),
            );
        }
        if !self.jwt.test_mode && self.jwt.hmac_secret.is_some() {
            return Err("jwt.hmac_secret must not be set outside test_mode".to_string());
        }

        self.cors.validate()?;

        let policies = self.resolved_rate_limit_policies();
        for route in &self.routes {
            route.validate()?;
            if let Some(policy_name) = &route.rate_limit_policy {
                if !policies.contains_key(policy_name) {
                    return Err(format!(
                        "route '{}' references unknown rate limit policy '{}'",
                        route.id, policy_name
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_settings() -> Settings {
        Settings {
            version: 1,
            jwt: JwtSettings::default(),
            redis: RedisSettings::default(),
            telemetry: TelemetrySettings::default(),
            cors: CorsSettings::default(),
            admin: AdminSettings::default(),
            trusted_proxy: TrustedProxySettings::default(),
            circuit_breaker_defaults: CircuitBreakerPolicy::default(),
            rate_limit_policies: HashMap::new(),
            routes: vec![],
        }
    }

    #[test]
    fn default_settings_validate() {
        assert!(base_settings().validate().is_ok());
    }

    #[test]
    fn test_mode_requires_secret() {
        let mut s = base_settings();
        s.jwt.test_mode = true;
        assert!(s.validate().is_err());
        s.jwt.hmac_secret = Some("at-least-sixteen-chars".to_string());
        assert!(s.validate().is_ok());
    }

    #[test]
    fn production_mode_rejects_hmac_secret() {
        let mut s = base_settings();
        s.jwt.hmac_secret = Some("should-not-be-here".to_string());
        assert!(s.validate().is_err());
    }

    #[test]
    fn cors_wildcard_with_credentials_rejected() {
        let mut s = base_settings();
        s.cors.allowed_origins = vec!["*".to_string()];
        s.cors.allow_credentials = true;
        assert!(s.validate().is_err());
    }

    #[test]
    fn resolved_policies_include_builtins() {
        let s = base_settings();
        let policies = s.resolved_rate_limit_policies();
        assert!(policies.contains_key("default"));
        assert!(policies.contains_key("strict"));
    }
}
