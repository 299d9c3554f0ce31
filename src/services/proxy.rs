//! Reverse Proxy (C10): forwards a request to its route's upstream and
//! returns the raw upstream response for the envelope/error filters to
//! finish processing (§4.9).
//!
//! Grounded on the teacher's `services::http::RouteHandler`: the pooled
//! `reqwest::Client`, the Actix-to-reqwest method conversion, and the
//! hop-by-hop header filtering are all kept. Route matching, circuit
//! breaking, and retry/load-balancing are no longer this module's job —
//! those moved to the filter chain (C7-C9) and `RouteTable` (C8) — so this
//! is a much thinner adapter than its ancestor: one route, one upstream,
//! one attempt.

use std::net::IpAddr;
use std::time::Duration;

use actix_web::http::header::HeaderMap as ActixHeaderMap;
use actix_web::http::Method as ActixMethod;
use log::warn;
use reqwest::{
    header::{HeaderName, HeaderValue},
    Client, Method as ReqwestMethod,
};

use crate::models::error::{GatewayError, GatewayErrorKind};

/// Default cap on a buffered upstream response body (§4.11): past this, the
/// envelope filter cannot safely wrap the body in JSON and falls back to
/// streaming it unwrapped.
pub const DEFAULT_MAX_BUFFERED_BODY_BYTES: usize = 1024 * 1024;

const HOP_BY_HOP_HEADERS: &[&str] = &[
    "host",
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "cookie",
];

pub struct ProxyResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// `true` if the body was larger than the buffering cap and was
    /// truncated; callers must not attempt to envelope-wrap it.
    pub body_truncated: bool,
}

#[derive(Clone)]
pub struct ProxyClient {
    client: Client,
    max_buffered_body_bytes: usize,
}

impl ProxyClient {
    pub fn new(max_buffered_body_bytes: usize) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(32)
            .build()
            .expect("failed to build upstream HTTP client");
        Self {
            client,
            max_buffered_body_bytes,
        }
    }

    /// Forwards one request to `target_url`, adding the canonical
    /// `X-Forwarded-*` set (§4.9) and stripping hop-by-hop headers before
    /// the upstream call.
    #[allow(clippy::too_many_arguments)]
    pub async fn forward(
        &self,
        method: &ActixMethod,
        target_url: &str,
        inbound_headers: &ActixHeaderMap,
        body: Vec<u8>,
        client_ip: IpAddr,
        forwarded_proto: &str,
        forwarded_host: &str,
        timeout_secs: u64,
        request_id: &str,
    ) -> Result<ProxyResponse, GatewayError> {
        let reqwest_method = to_reqwest_method(method);
        let headers = self.build_forwarded_headers(inbound_headers, client_ip, forwarded_proto, forwarded_host);

        let request = self
            .client
            .request(reqwest_method, target_url)
            .headers(headers)
            .body(body);

        let response = tokio::time::timeout(Duration::from_secs(timeout_secs), request.send())
            .await
            .map_err(|_| {
                GatewayError::new(
                    GatewayErrorKind::UpstreamTimeout,
                    format!("upstream timed out after {timeout_secs}s"),
                    request_id,
                )
            })?
            .map_err(|e| GatewayError::new(GatewayErrorKind::UpstreamUnreachable, e.to_string(), request_id))?;

        let status = response.status().as_u16();
        let response_headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter(|(name, _)| !HOP_BY_HOP_HEADERS.contains(&name.as_str().to_lowercase().as_str()))
            .map(|(name, value)| {
                (name.to_string(), value.to_str().unwrap_or_default().to_string())
            })
            .collect();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| GatewayError::new(GatewayErrorKind::UpstreamError, e.to_string(), request_id))?;

        let body_truncated = bytes.len() > self.max_buffered_body_bytes;
        if body_truncated {
            warn!(
                "upstream response for {target_url} exceeded {} bytes, bypassing envelope wrap",
                self.max_buffered_body_bytes
            );
        }

        Ok(ProxyResponse {
            status,
            headers: response_headers,
            body: bytes.to_vec(),
            body_truncated,
        })
    }

    fn build_forwarded_headers(
        &self,
        inbound: &ActixHeaderMap,
        client_ip: IpAddr,
        forwarded_proto: &str,
        forwarded_host: &str,
    ) -> reqwest::header::HeaderMap {
        let mut headers = reqwest::header::HeaderMap::with_capacity(inbound.len() + 4);
        for (name, value) in inbound {
            let name_str = name.as_str().to_lowercase();
            if HOP_BY_HOP_HEADERS.contains(&name_str.as_str()) {
                continue;
            }
            if let (Ok(header_name), Ok(header_value)) = (
                HeaderName::from_bytes(name.as_ref()),
                HeaderValue::from_bytes(value.as_bytes()),
            ) {
                headers.insert(header_name, header_value);
            }
        }

        let existing_xff = inbound
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let xff = if existing_xff.is_empty() {
            client_ip.to_string()
        } else {
            format!("{existing_xff}, {client_ip}")
        };
        if let Ok(value) = HeaderValue::from_str(&xff) {
            headers.insert(HeaderName::from_static("x-forwarded-for"), value);
        }
        if let Ok(value) = HeaderValue::from_str(forwarded_proto) {
            headers.insert(HeaderName::from_static("x-forwarded-proto"), value);
        }
        if let Ok(value) = HeaderValue::from_str(forwarded_host) {
            headers.insert(HeaderName::from_static("x-forwarded-host"), value);
        }

        headers
    }
}

fn to_reqwest_method(method: &ActixMethod) -> ReqwestMethod {
    match *method {
        ActixMethod::GET => ReqwestMethod::GET,
        ActixMethod::POST => ReqwestMethod::POST,
        ActixMethod::PUT => ReqwestMethod::PUT,
        ActixMethod::DELETE => ReqwestMethod::DELETE,
        ActixMethod::HEAD => ReqwestMethod::HEAD,
        ActixMethod::OPTIONS => ReqwestMethod::OPTIONS,
        ActixMethod::CONNECT => ReqwestMethod::CONNECT,
        ActixMethod::PATCH => ReqwestMethod::PATCH,
        ActixMethod::TRACE => ReqwestMethod::TRACE,
        _ => ReqwestMethod::GET,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hop_by_hop_headers_are_recognized() {
        assert!(HOP_BY_HOP_HEADERS.contains(&"connection"));
        assert!(HOP_BY_HOP_HEADERS.contains(&"transfer-encoding"));
        assert!(HOP_BY_HOP_HEADERS.contains(&"cookie"));
        assert!(!HOP_BY_HOP_HEADERS.contains(&"authorization"));
    }

    #[test]
    fn default_buffer_cap_is_one_mebibyte() {
        assert_eq!(DEFAULT_MAX_BUFFERED_BODY_BYTES, 1024 * 1024);
    }
}
