//! Service layer implementations for the gateway.
//!
//! # Module Organization
//!
//! - [`kv`] - Redis client shared by the block store, rate limiter, and login tracker (C1)
//! - [`telemetry`] - Non-blocking best-effort event publication (C2)
//! - [`jwt_verifier`] - JWKS-backed JWT verification and principal extraction (C3)
//! - [`block_store`] - User/IP deny-list (C4)
//! - [`login_attempts`] - Failed-auth counters feeding the block store (C5)
//! - [`rate_limiter`] - Redis-atomic token-bucket enforcement (C6)
//! - [`circuit_breaker`] - Per-upstream ring-buffer circuit breakers (C7)
//! - [`proxy`] - Reverse proxy adapter to the matched route's upstream (C10)

pub mod block_store;
pub mod circuit_breaker;
pub mod jwt_verifier;
pub mod kv;
pub mod login_attempts;
pub mod proxy;
pub mod rate_limiter;
pub mod telemetry;
