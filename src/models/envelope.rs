//! The standard response envelope (§3, §4.10) wrapping downstream JSON.

use serde::Serialize;
use serde_json::Value;

pub const GATEWAY_NAME: &str = "API-Gateway";
pub const GATEWAY_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize)]
pub struct EnvelopeMeta {
    pub request_id: String,
    pub duration_ms: u64,
    pub gateway: &'static str,
    pub version: &'static str,
}

impl EnvelopeMeta {
    pub fn new(request_id: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            request_id: request_id.into(),
            duration_ms,
            gateway: GATEWAY_NAME,
            version: GATEWAY_VERSION,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EnvelopeErrorDetails {
    pub http_status: u16,
    pub original_response: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnvelopeError {
    pub r#type: String,
    pub details: EnvelopeErrorDetails,
    pub trace_id: String,
}

/// `{success, code, message, data?, error?, meta}` per §3.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub success: bool,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<EnvelopeError>,
    pub meta: EnvelopeMeta,
}

impl Envelope {
    pub fn success(data: Value, request_id: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            success: true,
            code: "SUCCESS".to_string(),
            message: "OK".to_string(),
            data: Some(data),
            error: None,
            meta: EnvelopeMeta::new(request_id, duration_ms),
        }
    }

    pub fn failure(
        status: u16,
        original_response: Value,
        request_id: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        let request_id = request_id.into();
        let code = code_for_status(status);
        Self {
            success: false,
            code: code.to_string(),
            message: friendly_message(status).to_string(),
            data: None,
            error: Some(EnvelopeError {
                r#type: code.to_lowercase(),
                details: EnvelopeErrorDetails {
                    http_status: status,
                    original_response,
                },
                trace_id: request_id.clone(),
            }),
            meta: EnvelopeMeta::new(request_id, duration_ms),
        }
    }
}

/// Status-to-code mapping table from §4.10.
pub fn code_for_status(status: u16) -> &'static str {
    match status {
        401 => "UNAUTHENTICATED",
        403 => "FORBIDDEN",
        404 => "NOT_FOUND",
        409 => "CONFLICT",
        422 => "VALIDATION",
        429 => "RATE_LIMIT",
        500..=599 => "UPSTREAM_ERROR",
        _ => "ERROR",
    }
}

fn friendly_message(status: u16) -> &'static str {
    match status {
        401 => "Authentication is required to access this resource",
        403 => "You do not have permission to access this resource",
        404 => "The requested resource was not found",
        409 => "The request conflicts with the current state of the resource",
        422 => "The request could not be validated",
        429 => "Too many requests",
        500..=599 => "The upstream service returned an error",
        _ => "An error occurred while processing the request",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_wraps_data() {
        let env = Envelope::success(serde_json::json!({"id": 1}), "req-1", 12);
        assert!(env.success);
        assert_eq!(env.code, "SUCCESS");
        assert_eq!(env.meta.gateway, GATEWAY_NAME);
        assert_eq!(env.meta.version, GATEWAY_VERSION);
    }

    #[test]
    fn code_mapping_matches_table() {
        assert_eq!(code_for_status(401), "UNAUTHENTICATED");
        assert_eq!(code_for_status(403), "FORBIDDEN");
        assert_eq!(code_for_status(404), "NOT_FOUND");
        assert_eq!(code_for_status(409), "CONFLICT");
        assert_eq!(code_for_status(422), "VALIDATION");
        assert_eq!(code_for_status(429), "RATE_LIMIT");
        assert_eq!(code_for_status(502), "UPSTREAM_ERROR");
        assert_eq!(code_for_status(418), "ERROR");
    }
}
