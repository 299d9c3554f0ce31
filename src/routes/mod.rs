//! HTTP route handlers for the gateway.
//!
//! - [`route_table`] - The catch-all proxy handler (C8 matching + C9 chain + C10 forward)
//! - [`admin`] - Block-list and login-attempt management API (C15)
//! - [`health`] - Unauthenticated liveness/readiness probes

pub mod admin;
pub mod health;
pub mod route_table;
