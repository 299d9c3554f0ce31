//! Configuration management for the gateway.
//!
//! This module handles all aspects of gateway configuration: loading
//! settings from a file, environment variable overrides for the file path,
//! and cross-field validation. It provides secure and flexible configuration
//! management with comprehensive error handling.
//!
//! # Module Organization
//!
//! - [`settings`] - Configuration file loading and structural validation
//! - [`validation`] - Supplementary checks (route conflicts, security
//!   warnings, rate-limit coverage) beyond what `Settings::validate` treats
//!   as fatal
//!
//! # Configuration Sources
//!
//! 1. **Environment Variables**: `KAIROS_CONFIG_PATH` overrides the file path
//! 2. **Configuration File**: Primary source (JSON format)
//! 3. **Default Values**: Serde defaults on every optional `Settings` field
//!
//! # Security Features
//!
//! - **Path Traversal Protection**: Prevents access to files outside the working directory
//! - **File Size Limits**: Prevents memory exhaustion attacks
//! - **Input Validation**: Comprehensive validation of all configuration values
//! - **Safe Defaults**: Secure default values for all optional settings
//!
//! # Configuration Format
//!
//! ```json
//! {
//!   "version": 1,
//!   "jwt": { "issuer": "https://issuer.example/", "audience": "api-clients" },
//!   "routes": [
//!     {
//!       "id": "users",
//!       "methods": ["GET", "POST", "PUT", "DELETE"],
//!       "path": "/api/users/{id}",
//!       "upstream": "http://user-service:8080",
//!       "auth_required": true
//!     }
//!   ]
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `KAIROS_CONFIG_PATH`: Path to configuration file (default: `./config.json`)
//! - `KAIROS_HOST`: Server bind address (default: `0.0.0.0`)
//! - `KAIROS_PORT`: Server port number (default: `5900`)
//! - `NO_COLOR`: Disable colored log output
//!
//! # Examples
//!
//! ```rust
//! # use std::fs;
//! # let config_content = r#"{"version": 1, "jwt": {"issuer": "https://issuer.invalid/", "audience": "api-clients"}, "routes": []}"#;
//! # fs::write("./config.json", config_content).unwrap();
//! use kairos_rs::config::settings::load_settings;
//!
//! // load_settings() already calls Settings::validate() internally
//! let config = load_settings().expect("Failed to load configuration");
//! println!("Loaded {} routes", config.routes.len());
//! # fs::remove_file("./config.json").ok();
//! ```
//!
//! # Error Handling
//!
//! Configuration errors are handled gracefully with detailed error messages:
//! - File system errors (permissions, not found)
//! - JSON parsing errors with line/column information
//! - Validation errors with specific field information
//! - Security violations with protective measures

pub mod settings;
pub mod validation;
