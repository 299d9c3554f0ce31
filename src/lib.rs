//! # Kairos Gateway
//!
//! A high-performance, async HTTP API gateway built with Rust and Actix Web.
//! The gateway identifies every request, authenticates it against a JWT
//! issuer, enforces Redis-backed rate limits and block lists, trips
//! per-route circuit breakers around upstream calls, and rewrites upstream
//! responses into a uniform envelope (or an RFC 7807 problem-details body
//! on failure) before anything reaches the client.
//!
//! ## Quick Start
//!
//! ```rust
//! # use std::fs;
//! # let config_content = r#"{"version": 1, "jwt": {"issuer": "https://issuer.invalid/", "audience": "api-clients"}, "routes": []}"#;
//! # fs::write("./config.json", config_content).unwrap();
//! use kairos_rs::config::settings::load_settings;
//!
//! let config = load_settings().expect("Failed to load configuration");
//! println!("Loaded {} routes", config.routes.len());
//! # fs::remove_file("./config.json").ok();
//! ```
//!
//! ## Core Features
//!
//! ### Request Identification and Identity
//! - **Request IDs**: every request carries an `X-Request-ID`, validated if
//!   supplied by the caller or generated fresh
//! - **Identity Propagation**: a verified principal's claims are injected as
//!   `X-User-*` headers on the upstream call; any caller-supplied `X-User-*`
//!   or `X-Gateway-*` header is stripped first
//!
//! ### Security and Reliability
//! - **JWT Authentication**: RS256 against a cached JWKS in production, HS256
//!   against a static secret in test mode
//! - **Block Lists**: Redis-backed user/IP deny lists, with automatic
//!   blocking after repeated failed authentications
//! - **Rate Limiting**: atomic Redis token-bucket enforcement, named
//!   policies shared across routes
//! - **Circuit Breaking**: per-route sliding-window breakers around upstream
//!   calls
//!
//! ### Observability
//! - **Structured Logging**: colorized, leveled console output
//! - **Async Telemetry**: best-effort publication of access/auth/rate-limit/
//!   circuit-breaker events to a message bus, never blocking the request path
//! - **Health Endpoints**: Kubernetes-compatible health, readiness, and
//!   liveness checks
//! - **Problem Details**: every error response is RFC 7807 `application/problem+json`
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────┐   ┌───────────────────────────────────┐   ┌──────────────────┐
//! │   Client    │──▶│         Kairos Gateway            │──▶│   Upstream       │
//! │  (Browser,  │   │                                    │   │   Services       │
//! │   Mobile,   │   │  ┌─────────────┐  ┌──────────────┐ │   │ (Microservices,  │
//! │   API)      │   │  │ Block Check │─▶│ JWT Auth      │ │   │  APIs, etc.)     │
//! └─────────────┘   │  ├─────────────┤  ├──────────────┤ │   └──────────────────┘
//!                    │  │ Rate Limit  │─▶│ Circuit Break │ │
//!                    │  └─────────────┘  └──────────────┘ │
//!                    │           Filter Chain Engine       │
//!                    └───────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - **[`config`]** - Configuration management and file loading
//! - **[`models`]** - Data models, domain types, and validation logic
//! - **[`services`]** - Shared process-wide services (KV client, JWT
//!   verifier, rate limiter, circuit breaker registry, proxy client, ...)
//! - **[`routes`]** - HTTP route handlers (gateway catch-all, admin API, health)
//! - **[`middleware`]** - The filter chain (C9) and its registered filters
//! - **[`utils`]** - Route matching, client IP resolution, path helpers
//! - **[`logs`]** - Logging configuration and structured output
//! - **[`state`]** - Process-wide shared application state
//!
//! ## Configuration Example
//!
//! ```json
//! {
//!   "version": 1,
//!   "jwt": { "issuer": "https://issuer.example/", "audience": "api-clients" },
//!   "routes": [
//!     {
//!       "id": "users",
//!       "methods": ["GET", "PUT", "DELETE"],
//!       "path": "/users/{id}",
//!       "upstream": "http://user-service:8080",
//!       "auth_required": true,
//!       "rate_limit_policy": "default",
//!       "circuit_breaker": "user-service"
//!     }
//!   ]
//! }
//! ```
//!
//! ## Environment Variables
//!
//! - `KAIROS_CONFIG_PATH`: Configuration file path (default: `./config.json`)
//! - `KAIROS_HOST`: Server bind address (default: `0.0.0.0`)
//! - `KAIROS_PORT`: Server port (default: `5900`)
//! - `NO_COLOR`: Disable colored log output

pub mod config;
pub mod logs;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;
