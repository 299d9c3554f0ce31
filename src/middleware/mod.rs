//! Request/response middleware for the gateway.
//!
//! Most cross-cutting concerns run as explicit entries in the [`chain`]
//! filter-chain registry rather than as Actix `.wrap()` middleware, so the
//! execution order is data (a sorted `Vec`) instead of nesting order of
//! `App::wrap()` calls:
//!
//! | Filter              | Order | Phase |
//! |----------------------|------:|-------|
//! | [`block_check`]       |  -80  | pre   |
//! | [`auth`]              |  -70  | pre   |
//! | [`attempt_tracking`]  |  -60  | post  |
//! | [`rate_limit`]        |  -50  | pre   |
//! | [`circuit_breaker`]   |  -40  | pre   |
//! | (identity propagation)|  +10  | inline, see [`identity_propagation`] |
//! | [`envelope_rewrite`]  |  +50  | post  |
//! | [`rate_limit_headers`]|  +60  | post  |
//! | [`telemetry_end`]     |  +90  | post  |
//!
//! `RequestId` and `Telemetry-Start` (order -100/-90) have no registry
//! entry: they run inline in `routes::route_table` because constructing a
//! `RequestContext` needs a request ID before any filter can run.
//! [`identity_propagation`] likewise runs inline, immediately before the
//! reverse-proxy call, since it mutates the outbound request rather than
//! the shared context.
//!
//! [`security`] stays outside the chain entirely: it's ordinary Actix
//! `DefaultHeaders` middleware applied via `.wrap()` in `main`, unrelated to
//! per-route gateway semantics.

pub mod attempt_tracking;
pub mod auth;
pub mod block_check;
pub mod chain;
pub mod circuit_breaker;
pub mod envelope_rewrite;
pub mod identity_propagation;
pub mod rate_limit;
pub mod rate_limit_headers;
pub mod security;
pub mod telemetry_end;
