//! Data models and domain types for the kairos-rs API gateway.
//!
//! This module contains the core data structures threaded through the
//! request pipeline: the per-request context, route configuration, the
//! response envelope, and the gateway error taxonomy.
//!
//! # Module Organization
//!
//! - [`context`] - `RequestContext` and `Principal`, built once per request
//! - [`envelope`] - The standard JSON response wrapper
//! - [`error`] - Gateway error taxonomy and RFC 7807 problem-details
//! - [`route`] - Route configuration, rate-limit and circuit-breaker policies
//! - [`settings`] - Top-level application configuration
//!
//! # Examples
//!
//! ```rust
//! use kairos_rs::models::route::Route;
//!
//! let route = Route {
//!     id: "users".to_string(),
//!     methods: vec!["GET".to_string()],
//!     path: "/api/users/{id}".to_string(),
//!     upstream: "http://user-service:8080".to_string(),
//!     strip_prefix_segments: 1,
//!     public: false,
//!     auth_required: true,
//!     required_roles: vec![],
//!     rate_limit_policy: Some("default".to_string()),
//!     circuit_breaker: Some("user-service".to_string()),
//!     circuit_breaker_policy: None,
//!     upstream_timeout_secs: None,
//! };
//!
//! route.validate().expect("invalid route configuration");
//! ```

pub mod context;
pub mod envelope;
pub mod error;
pub mod route;
pub mod settings;
