//! Process-wide shared state: one instance built at startup and handed to
//! every worker via `web::Data`, per §5's "connection pools are process-wide,
//! sized from config, and safe for concurrent use."

use std::sync::Arc;

use crate::middleware::chain::FilterChainEngine;
use crate::models::route::RateLimitPolicy;
use crate::models::settings::Settings;
use crate::services::block_store::BlockStore;
use crate::services::circuit_breaker::CircuitBreakerRegistry;
use crate::services::jwt_verifier::JwtVerifier;
use crate::services::login_attempts::LoginAttemptTracker;
use crate::services::proxy::ProxyClient;
use crate::services::rate_limiter::RateLimiter;
use crate::services::telemetry::TelemetryEmitter;
use crate::utils::ip::PrivateRangeFilter;
use crate::utils::route_matcher::RouteTable;
use std::collections::HashMap;

pub struct AppState {
    pub settings: Arc<Settings>,
    pub routes: RouteTable,
    pub jwt_verifier: Arc<JwtVerifier>,
    pub block_store: Arc<BlockStore>,
    pub login_attempts: Arc<LoginAttemptTracker>,
    pub rate_limiter: Arc<RateLimiter>,
    pub circuit_breakers: Arc<CircuitBreakerRegistry>,
    pub proxy: Arc<ProxyClient>,
    pub telemetry: TelemetryEmitter,
    pub private_ranges: Arc<PrivateRangeFilter>,
    pub rate_limit_policies: Arc<HashMap<String, RateLimitPolicy>>,
    pub chain: FilterChainEngine,
}
