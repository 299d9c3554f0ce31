//! Route table matching (C8, §4.2): `(method ∈ allowed ∨ any) ∧ path matches
//! glob` in declaration order, first match wins.
//!
//! Grounded on the teacher's `utils::route_matcher::RouteMatcher` (the
//! `{param}` → regex conversion and `Arc<Regex>` sharing are kept verbatim);
//! generalized for method predicates, a trailing `**` wildcard, and
//! first-match-in-declaration-order semantics instead of specificity
//! sorting — the teacher's "first static, then most-specific-dynamic"
//! strategy is explicitly not what §4.2 asks for.

use crate::models::route::Route;
use regex::Regex;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum RouteMatchError {
    #[error("Invalid route pattern: {pattern}")]
    InvalidPattern { pattern: String },
    #[error("Regex compilation failed: {0}")]
    RegexError(String),
}

#[derive(Debug, Clone)]
struct CompiledRoute {
    route: Arc<Route>,
    regex: Arc<Regex>,
}

/// Matches an inbound `(method, path)` against the configured routes, in
/// declaration order, returning the matched route and the path to forward
/// (after `strip_prefix_segments` removal).
#[derive(Debug)]
pub struct RouteTable {
    routes: Vec<CompiledRoute>,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Result<Self, RouteMatchError> {
        let mut compiled = Vec::with_capacity(routes.len());
        for route in routes {
            let regex_pattern = Self::convert_pattern_to_regex(&route.path)?;
            let regex = Regex::new(&regex_pattern).map_err(|e| RouteMatchError::RegexError(e.to_string()))?;
            compiled.push(CompiledRoute {
                route: Arc::new(route),
                regex: Arc::new(regex),
            });
        }
        Ok(Self { routes: compiled })
    }

    /// Returns the first route (in declaration order) whose method
    /// predicate and path glob both match, along with the path to forward
    /// upstream after prefix stripping.
    pub fn find_match(&self, method: &str, path: &str) -> Option<(Arc<Route>, String)> {
        for compiled in &self.routes {
            if !Self::method_matches(&compiled.route, method) {
                continue;
            }
            if compiled.regex.is_match(path) {
                let forwarded = Self::strip_prefix_segments(path, compiled.route.strip_prefix_segments);
                return Some((compiled.route.clone(), forwarded));
            }
        }
        None
    }

    fn method_matches(route: &Route, method: &str) -> bool {
        route.methods.is_empty() || route.methods.iter().any(|m| m.eq_ignore_ascii_case(method))
    }

    /// Removes the first `n` path segments, preserving the leading `/`.
    /// `strip_prefix_segments(/api/v1/users/42, 2)` -> `/users/42`.
    pub fn strip_prefix_segments(path: &str, n: usize) -> String {
        if n == 0 {
            return path.to_string();
        }
        let mut segments: Vec<&str> = path.split('/').collect();
        // path.split('/') on "/a/b" yields ["", "a", "b"]; drop the leading
        // empty segment before counting, then restore the leading slash.
        if segments.first() == Some(&"") {
            segments.remove(0);
        }
        let remaining: Vec<&str> = segments.into_iter().skip(n).collect();
        format!("/{}", remaining.join("/"))
    }

    /// Converts a route path pattern into an anchored regex:
    /// - literal segments are regex-escaped,
    /// - `{param}` matches exactly one non-`/` segment,
    /// - a trailing `/**` matches zero or more remaining segments.
    fn convert_pattern_to_regex(pattern: &str) -> Result<String, RouteMatchError> {
        let (base, glob_suffix) = match pattern.strip_suffix("/**") {
            Some(stripped) => (stripped, true),
            None => (pattern, false),
        };

        let mut regex_pattern = String::with_capacity(pattern.len() * 2);
        regex_pattern.push('^');

        let mut chars = base.chars().peekable();
        while let Some(ch) = chars.next() {
            match ch {
                '{' => {
                    let mut param_name = String::new();
                    let mut found_closing = false;
                    for inner_ch in chars.by_ref() {
                        if inner_ch == '}' {
                            found_closing = true;
                            break;
                        }
                        if inner_ch.is_alphanumeric() || inner_ch == '_' {
                            param_name.push(inner_ch);
                        } else {
                            return Err(RouteMatchError::InvalidPattern {
                                pattern: pattern.to_string(),
                            });
                        }
                    }
                    if !found_closing || param_name.is_empty() {
                        return Err(RouteMatchError::InvalidPattern {
                            pattern: pattern.to_string(),
                        });
                    }
                    regex_pattern.push_str("([^/]+)");
                }
                '.' | '?' | '*' | '+' | '^' | '$' | '[' | ']' | '(' | ')' | '|' | '\\' => {
                    regex_pattern.push('\\');
                    regex_pattern.push(ch);
                }
                _ => regex_pattern.push(ch),
            }
        }

        if glob_suffix {
            regex_pattern.push_str("(?:/.*)?");
        }
        regex_pattern.push('$');
        Ok(regex_pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::route::Route;

    fn route(id: &str, methods: &[&str], path: &str, strip: usize) -> Route {
        Route {
            id: id.to_string(),
            methods: methods.iter().map(|s| s.to_string()).collect(),
            path: path.to_string(),
            upstream: "http://backend:8080".to_string(),
            strip_prefix_segments: strip,
            public: true,
            auth_required: false,
            required_roles: vec![],
            rate_limit_policy: None,
            circuit_breaker: None,
            circuit_breaker_policy: None,
            upstream_timeout_secs: None,
        }
    }

    #[test]
    fn static_route_matches() {
        let table = RouteTable::new(vec![route("health", &["GET"], "/public/health", 0)]).unwrap();
        let (matched, forwarded) = table.find_match("GET", "/public/health").unwrap();
        assert_eq!(matched.id, "health");
        assert_eq!(forwarded, "/public/health");
    }

    #[test]
    fn dynamic_param_matches_single_segment() {
        let table = RouteTable::new(vec![route("users", &["GET"], "/api/users/{id}", 1)]).unwrap();
        let (matched, forwarded) = table.find_match("GET", "/api/users/42").unwrap();
        assert_eq!(matched.id, "users");
        assert_eq!(forwarded, "/users/42");

        assert!(table.find_match("GET", "/api/users/42/extra").is_none());
    }

    #[test]
    fn glob_suffix_matches_any_depth() {
        let table = RouteTable::new(vec![route("assets", &["GET"], "/static/**", 1)]).unwrap();
        assert!(table.find_match("GET", "/static").is_none());
        let (_, forwarded) = table.find_match("GET", "/static/css/app.css").unwrap();
        assert_eq!(forwarded, "/css/app.css");
    }

    #[test]
    fn method_mismatch_is_no_match() {
        let table = RouteTable::new(vec![route("users", &["POST"], "/api/users", 0)]).unwrap();
        assert!(table.find_match("GET", "/api/users").is_none());
    }

    #[test]
    fn empty_methods_matches_any() {
        let table = RouteTable::new(vec![route("any", &[], "/api/ping", 0)]).unwrap();
        assert!(table.find_match("DELETE", "/api/ping").is_some());
    }

    #[test]
    fn first_declared_match_wins() {
        let table = RouteTable::new(vec![
            route("specific", &["GET"], "/api/users/admin", 0),
            route("generic", &["GET"], "/api/users/{id}", 0),
        ])
        .unwrap();
        // The generic dynamic route is declared second; even though it also
        // matches "/api/users/admin", the first declared match wins.
        let (matched, _) = table.find_match("GET", "/api/users/admin").unwrap();
        assert_eq!(matched.id, "specific");
    }

    #[test]
    fn strip_prefix_segments_removes_leading_segments() {
        assert_eq!(RouteTable::strip_prefix_segments("/api/v1/users/42", 2), "/users/42");
        assert_eq!(RouteTable::strip_prefix_segments("/api/v1", 0), "/api/v1");
        assert_eq!(RouteTable::strip_prefix_segments("/api", 5), "/");
    }
}
