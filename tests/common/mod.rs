//! Shared harness for the full-chain integration tests: builds a real
//! `AppState` (wired exactly as `main.rs` wires it) against a local Redis
//! instance, plus helpers for minting HS256 test tokens and starting a
//! mock upstream.
//!
//! These tests require a Redis instance reachable at `KAIROS_TEST_REDIS_URL`
//! (default `redis://127.0.0.1:6379/15`); db 15 keeps them off a
//! developer's default db 0.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;
use serde_json::json;

use kairos_rs::middleware::attempt_tracking::AttemptTrackingFilter;
use kairos_rs::middleware::auth::AuthFilter;
use kairos_rs::middleware::block_check::BlockCheckFilter;
use kairos_rs::middleware::chain::{FilterChainEngine, PostFilter, PreFilter};
use kairos_rs::middleware::circuit_breaker::CircuitBreakerFilter;
use kairos_rs::middleware::envelope_rewrite::EnvelopeRewriteFilter;
use kairos_rs::middleware::rate_limit::RateLimitFilter;
use kairos_rs::middleware::rate_limit_headers::RateLimitHeadersFilter;
use kairos_rs::middleware::telemetry_end::TelemetryEndFilter;
use kairos_rs::models::route::{CircuitBreakerPolicy, Route};
use kairos_rs::models::settings::{
    AdminSettings, CorsSettings, JwtSettings, RedisSettings, Settings, TelemetrySettings,
    TrustedProxySettings,
};
use kairos_rs::services::block_store::BlockStore;
use kairos_rs::services::circuit_breaker::CircuitBreakerRegistry;
use kairos_rs::services::jwt_verifier::JwtVerifier;
use kairos_rs::services::kv::KvClient;
use kairos_rs::services::login_attempts::LoginAttemptTracker;
use kairos_rs::services::proxy::ProxyClient;
use kairos_rs::services::rate_limiter::RateLimiter;
use kairos_rs::services::telemetry::TelemetryEmitter;
use kairos_rs::state::AppState;
use kairos_rs::utils::ip::PrivateRangeFilter;
use kairos_rs::utils::route_matcher::RouteTable;

pub const HMAC_SECRET: &str = "integration-test-hmac-secret-value";
pub const ISSUER: &str = "https://issuer.test/";
pub const AUDIENCE: &str = "api-clients";

pub fn redis_url() -> String {
    std::env::var("KAIROS_TEST_REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379/15".to_string())
}

#[derive(Serialize)]
struct TestClaims<'a> {
    sub: &'a str,
    exp: usize,
    iss: &'a str,
    aud: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    roles: Vec<&'a str>,
}

/// Mints a valid HS256 token accepted by a `JwtVerifier` built in test mode
/// with [`HMAC_SECRET`].
pub fn mint_token(subject: &str, roles: &[&str]) -> String {
    let exp = (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize;
    let claims = TestClaims {
        sub: subject,
        exp,
        iss: ISSUER,
        aud: AUDIENCE,
        roles: roles.to_vec(),
    };
    encode(
        &Header::new(jsonwebtoken::Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(HMAC_SECRET.as_bytes()),
    )
    .expect("failed to mint test token")
}

/// Connects to the test Redis instance and flushes every key this harness
/// could have touched, so tests stay independent of execution order.
pub async fn fresh_kv() -> KvClient {
    let kv = KvClient::connect(&redis_url(), Duration::from_millis(500))
        .await
        .expect("a local Redis instance must be reachable at KAIROS_TEST_REDIS_URL for gateway integration tests");
    for pattern in ["blocked:*", "login_attempts:*", "rl:*"] {
        if let Ok(keys) = kv.scan_keys(pattern).await {
            for key in keys {
                let _ = kv.del(&key).await;
            }
        }
    }
    kv
}

/// Builds a full `AppState` wired exactly as `main.rs` does, over the given
/// routes, with JWT verification in HS256 test mode.
pub async fn build_state(kv: KvClient, routes: Vec<Route>) -> actix_web::web::Data<AppState> {
    build_state_with_policies(kv, routes, HashMap::new()).await
}

/// Same as [`build_state`] but merges `extra_policies` on top of the four
/// built-in rate-limit policies, for scenarios that need a bucket shape the
/// built-ins can't express.
pub async fn build_state_with_policies(
    kv: KvClient,
    routes: Vec<Route>,
    extra_policies: HashMap<String, kairos_rs::models::route::RateLimitPolicy>,
) -> actix_web::web::Data<AppState> {
    let settings = Settings {
        version: 1,
        jwt: JwtSettings {
            issuer: ISSUER.to_string(),
            audience: AUDIENCE.to_string(),
            jwks_url: None,
            jwks_timeout_ms: 3_000,
            test_mode: true,
            hmac_secret: Some(HMAC_SECRET.to_string()),
            public_prefixes: vec!["/public/".to_string(), "/auth/".to_string(), "/health".to_string()],
        },
        redis: RedisSettings::default(),
        telemetry: TelemetrySettings::default(),
        cors: CorsSettings::default(),
        admin: AdminSettings::default(),
        trusted_proxy: TrustedProxySettings::default(),
        circuit_breaker_defaults: CircuitBreakerPolicy::default(),
        rate_limit_policies: extra_policies,
        routes: routes.clone(),
    };

    let telemetry = TelemetryEmitter::start(None, 1_000);
    let jwt_verifier = JwtVerifier::new(
        settings.jwt.issuer.clone(),
        settings.jwt.audience.clone(),
        settings.jwt.jwks_url(),
        Duration::from_millis(settings.jwt.jwks_timeout_ms),
        settings.jwt.test_mode,
        settings.jwt.hmac_secret.clone(),
    );
    let block_store = BlockStore::new(kv.clone());
    let login_attempts = LoginAttemptTracker::new(kv.clone(), BlockStore::new(kv.clone()));
    let rate_limiter = RateLimiter::new(kv.clone(), telemetry.clone());
    let circuit_breakers = CircuitBreakerRegistry::new(settings.circuit_breaker_defaults, telemetry.clone());
    let proxy = ProxyClient::new(10 * 1024 * 1024);
    let private_ranges = PrivateRangeFilter::new(&settings.trusted_proxy.private_ranges).unwrap();
    let rate_limit_policies = settings.resolved_rate_limit_policies();
    let routes = RouteTable::new(settings.routes.clone()).expect("test routes must be well-formed");

    let pre_filters: Vec<Box<dyn PreFilter>> = vec![
        Box::new(BlockCheckFilter),
        Box::new(AuthFilter),
        Box::new(RateLimitFilter),
        Box::new(CircuitBreakerFilter),
    ];
    let post_filters: Vec<Box<dyn PostFilter>> = vec![
        Box::new(AttemptTrackingFilter),
        Box::new(EnvelopeRewriteFilter),
        Box::new(RateLimitHeadersFilter),
        Box::new(TelemetryEndFilter),
    ];
    let chain = FilterChainEngine::new(pre_filters, post_filters);

    actix_web::web::Data::new(AppState {
        settings: Arc::new(settings),
        routes,
        jwt_verifier: Arc::new(jwt_verifier),
        block_store: Arc::new(block_store),
        login_attempts: Arc::new(login_attempts),
        rate_limiter: Arc::new(rate_limiter),
        circuit_breakers: Arc::new(circuit_breakers),
        proxy: Arc::new(proxy),
        telemetry,
        private_ranges: Arc::new(private_ranges),
        rate_limit_policies: Arc::new(rate_limit_policies),
        chain,
    })
}

/// A route forwarding to `upstream`, requiring auth, with no rate limit or
/// circuit breaker — the baseline "protected API route" shape used across
/// the scenario tests.
pub fn protected_route(id: &str, path: &str, upstream: &str) -> Route {
    Route {
        id: id.to_string(),
        methods: vec![],
        path: path.to_string(),
        upstream: upstream.to_string(),
        strip_prefix_segments: 0,
        public: false,
        auth_required: true,
        required_roles: vec![],
        rate_limit_policy: None,
        circuit_breaker: None,
        circuit_breaker_policy: None,
        upstream_timeout_secs: None,
    }
}

pub fn public_route(id: &str, path: &str, upstream: &str) -> Route {
    let mut route = protected_route(id, path, upstream);
    route.public = true;
    route.auth_required = false;
    route
}

pub fn upstream_ok_body() -> serde_json::Value {
    json!({"id": 42, "name": "ada"})
}
