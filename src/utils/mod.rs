//! Utility functions supporting the gateway's routing and filter chain.
//!
//! # Module Organization
//!
//! - [`ip`] - Trusted-proxy client IP resolution and RFC1918 filtering
//! - [`path`] - Upstream URL construction and request-id validation
//! - [`route_matcher`] - Ordered method+glob route table matching (C8)

pub mod ip;
pub mod path;
pub mod route_matcher;
