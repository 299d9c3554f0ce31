//! Advanced configuration validation with detailed error reporting.
//!
//! This module provides comprehensive validation for gateway configuration,
//! including security checks, performance recommendations, and detailed
//! error reporting for troubleshooting. `Settings::validate` (the teacher's
//! "fail the config load" gate) stays the authority for what's an outright
//! error; this module adds the warnings and recommendations an operator
//! would want surfaced but that don't justify refusing to start.

use crate::models::settings::Settings;
use std::collections::HashSet;

/// Result of configuration validation containing errors, warnings, and recommendations.
///
/// This structure provides detailed feedback about configuration issues,
/// categorized by severity (errors, warnings, recommendations).
///
/// # Examples
///
/// ```
/// use kairos_rs::config::validation::ValidationResult;
///
/// let mut result = ValidationResult::new();
/// result.add_error("Missing required field".to_string());
/// result.add_warning("Using default value".to_string());
/// result.add_recommendation("Consider enabling HTTPS".to_string());
///
/// assert!(!result.is_valid);
/// assert_eq!(result.errors.len(), 1);
/// assert_eq!(result.warnings.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Whether the configuration is valid (no errors)
    pub is_valid: bool,
    /// Critical errors that prevent configuration use
    pub errors: Vec<String>,
    /// Non-critical issues that should be addressed
    pub warnings: Vec<String>,
    /// Suggestions for improving configuration
    pub recommendations: Vec<String>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationResult {
    /// Creates a new validation result with no errors, warnings, or recommendations.
    ///
    /// # Examples
    ///
    /// ```
    /// use kairos_rs::config::validation::ValidationResult;
    ///
    /// let result = ValidationResult::new();
    /// assert!(result.is_valid);
    /// assert!(result.errors.is_empty());
    /// ```
    pub fn new() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            recommendations: Vec::new(),
        }
    }

    /// Adds a critical error and marks validation as failed.
    pub fn add_error(&mut self, error: String) {
        self.is_valid = false;
        self.errors.push(error);
    }

    /// Adds a non-critical warning that should be addressed.
    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    /// Adds a recommendation for improving the configuration.
    pub fn add_recommendation(&mut self, recommendation: String) {
        self.recommendations.push(recommendation);
    }
}

/// Enhanced configuration validator with security and performance checks,
/// run in addition to [`Settings::validate`].
///
/// Provides:
/// - Per-route structural validation (delegated to `Route::validate`)
/// - Security checks (plaintext upstreams, world-open CORS)
/// - Performance recommendations (route count, missing rate limits)
/// - Route conflict detection (duplicate id, duplicate method+path)
///
/// # Examples
///
/// ```
/// # use std::fs;
/// # let config_content = r#"{"version": 1, "jwt": {"issuer": "https://issuer.invalid/", "audience": "api-clients"}, "routes": []}"#;
/// # fs::write("./config.json", config_content).unwrap();
/// use kairos_rs::config::settings::load_settings;
/// use kairos_rs::config::validation::ConfigValidator;
///
/// let settings = load_settings().expect("Failed to load settings");
/// let result = ConfigValidator::validate_comprehensive(&settings);
///
/// if !result.is_valid {
///     for error in &result.errors {
///         eprintln!("Error: {}", error);
///     }
/// }
/// # fs::remove_file("./config.json").ok();
/// ```
pub struct ConfigValidator;

impl ConfigValidator {
    /// Performs comprehensive validation of gateway settings.
    ///
    /// Validates all aspects of the configuration including structure, security,
    /// performance, and route conflicts.
    pub fn validate_comprehensive(settings: &Settings) -> ValidationResult {
        let mut result = ValidationResult::new();

        if let Err(e) = settings.validate() {
            result.add_error(e);
        }

        Self::validate_route_count(settings, &mut result);
        Self::validate_route_conflicts(settings, &mut result);
        Self::validate_security(settings, &mut result);
        Self::validate_rate_limit_coverage(settings, &mut result);

        result
    }

    fn validate_route_count(settings: &Settings, result: &mut ValidationResult) {
        if settings.routes.is_empty() {
            result.add_warning(
                "No routes configured - gateway will not forward any requests".to_string(),
            );
        }
    }

    /// Flags duplicate route ids and ambiguous method+path pairs. Two routes
    /// can legitimately share a path with disjoint methods, so only an exact
    /// `(method, path)` pair counts as a conflict.
    fn validate_route_conflicts(settings: &Settings, result: &mut ValidationResult) {
        let mut seen_ids = HashSet::new();
        let mut seen_predicates = HashSet::new();

        for route in &settings.routes {
            if !seen_ids.insert(route.id.clone()) {
                result.add_error(format!("duplicate route id '{}'", route.id));
            }

            let methods: Vec<&str> = if route.methods.is_empty() {
                vec!["*"]
            } else {
                route.methods.iter().map(String::as_str).collect()
            };
            for method in methods {
                let predicate = (method.to_string(), route.path.clone());
                if !seen_predicates.insert(predicate) {
                    result.add_warning(format!(
                        "route '{}': method '{}' + path '{}' is already claimed by an earlier route; \
                         only the first match wins",
                        route.id, method, route.path
                    ));
                }
            }
        }
    }

    fn validate_security(settings: &Settings, result: &mut ValidationResult) {
        for route in &settings.routes {
            if route.upstream.starts_with("http://") {
                result.add_warning(format!(
                    "route '{}': upstream '{}' uses plaintext HTTP",
                    route.id, route.upstream
                ));
            }
        }

        if settings.cors.allowed_origins.iter().any(|o| o == "*") {
            result.add_recommendation(
                "cors.allowed_origins contains '*' - scope this to known origins in production"
                    .to_string(),
            );
        }

        if settings.jwt.test_mode {
            result.add_warning(
                "jwt.test_mode is enabled - HS256 against a static secret must never run in production"
                    .to_string(),
            );
        }
    }

    fn validate_rate_limit_coverage(settings: &Settings, result: &mut ValidationResult) {
        for route in &settings.routes {
            if route.rate_limit_policy.is_none() {
                result.add_recommendation(format!(
                    "route '{}' has no rate_limit_policy - it will never be throttled",
                    route.id
                ));
            }
        }
    }
}
