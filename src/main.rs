//! Kairos Gateway Server
//!
//! High-performance HTTP API gateway built with Rust and Actix Web.
//!
//! This binary wires every shared service (KV client, JWT verifier, block
//! store, login-attempt tracker, rate limiter, circuit breaker registry,
//! reverse-proxy client), builds the filter chain in the order §4.3 fixes,
//! and starts the HTTP server with all required middleware and routing.

use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{middleware::Compress, middleware::Logger, web, App, HttpServer};
use log::{error, info};
use tokio::signal;

use kairos_rs::config::settings::load_settings;
use kairos_rs::config::validation::ConfigValidator;
use kairos_rs::logs::logger::configure_logger;
use kairos_rs::middleware::attempt_tracking::AttemptTrackingFilter;
use kairos_rs::middleware::auth::AuthFilter;
use kairos_rs::middleware::block_check::BlockCheckFilter;
use kairos_rs::middleware::chain::{FilterChainEngine, PostFilter, PreFilter};
use kairos_rs::middleware::circuit_breaker::CircuitBreakerFilter;
use kairos_rs::middleware::envelope_rewrite::EnvelopeRewriteFilter;
use kairos_rs::middleware::rate_limit::RateLimitFilter;
use kairos_rs::middleware::rate_limit_headers::RateLimitHeadersFilter;
use kairos_rs::middleware::security::security_headers;
use kairos_rs::middleware::telemetry_end::TelemetryEndFilter;
use kairos_rs::routes::admin::configure_admin;
use kairos_rs::routes::health::configure_health;
use kairos_rs::routes::route_table::gateway_handler;
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

/// Max request/response body this gateway buffers in memory while proxying.
const MAX_BUFFERED_BODY_BYTES: usize = 10 * 1024 * 1024;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    configure_logger();

    let settings = load_settings().expect("Failed to load settings");
    info!("Starting Kairos Gateway v{}", env!("CARGO_PKG_VERSION"));

    let validation_result = ConfigValidator::validate_comprehensive(&settings);
    if !validation_result.is_valid {
        error!("Configuration validation failed:");
        for err in &validation_result.errors {
            error!("  - {}", err);
        }
        std::process::exit(1);
    }
    for warning in &validation_result.warnings {
        log::warn!("config: {}", warning);
    }
    info!(
        "Configuration validated with {} warnings, {} recommendations",
        validation_result.warnings.len(),
        validation_result.recommendations.len()
    );

    let kv = KvClient::connect(
        &settings.redis.url,
        Duration::from_millis(settings.redis.command_timeout_ms),
    )
    .await
    .expect("Failed to connect to Redis");

    let telemetry = TelemetryEmitter::start(
        settings.telemetry.brokers.as_deref(),
        settings.telemetry.queue_capacity,
    );

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
    let circuit_breakers =
        CircuitBreakerRegistry::new(settings.circuit_breaker_defaults, telemetry.clone());
    let proxy = ProxyClient::new(MAX_BUFFERED_BODY_BYTES);

    let private_ranges = PrivateRangeFilter::new(&settings.trusted_proxy.private_ranges)
        .expect("Failed to parse trusted_proxy.private_ranges");

    let rate_limit_policies = settings.resolved_rate_limit_policies();
    let routes = RouteTable::new(settings.routes.clone()).expect("Failed to build route table");

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

    let cors_settings = settings.cors.clone();
    let admin_prefix = settings.admin.prefix.clone();

    let state = web::Data::new(AppState {
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
    });

    let host = std::env::var("KAIROS_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("KAIROS_PORT")
        .unwrap_or_else(|_| "5900".to_string())
        .parse::<u16>()
        .unwrap_or(5900);

    info!("Starting server on {}:{}", host, port);

    let server = HttpServer::new(move || {
        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
            .allow_any_header()
            .max_age(3600);
        cors = if cors_settings.allowed_origins.iter().any(|o| o == "*") {
            cors.allow_any_origin()
        } else {
            cors_settings
                .allowed_origins
                .iter()
                .fold(cors, |c, origin| c.allowed_origin(origin))
        };
        if cors_settings.allow_credentials {
            cors = cors.supports_credentials();
        }

        App::new()
            .app_data(state.clone())
            .wrap(cors)
            .wrap(Logger::new(
                r#"%a "%r" %s %b "%{Referer}i" "%{User-Agent}i" %T"#,
            ))
            .wrap(Compress::default())
            .wrap(security_headers())
            .configure(configure_health)
            .configure(configure_admin(&admin_prefix))
            .default_service(web::route().to(gateway_handler))
    })
    .bind((host.as_str(), port))?
    .run();

    info!("Server started successfully");

    // Graceful shutdown handling
    tokio::select! {
        result = server => {
            match result {
                Ok(_) => info!("Server stopped gracefully"),
                Err(e) => error!("Server error: {}", e),
            }
        }
        _ = signal::ctrl_c() => {
            info!("Received shutdown signal, stopping server...");
        }
    }

    Ok(())
}