//! JWT Verifier (C3): fetches and caches a remote JWKS, verifies
//! signature/issuer/audience/expiry, and extracts a [`Principal`](crate::models::context::Principal).
//!
//! Grounded on the teacher's `middleware::auth` (the `Claims` shape and
//! `Validation` wiring are kept) generalized for: a remote JWKS instead of a
//! single static secret, RS256 in production with an HS256 test-mode
//! escape hatch (§4.4), and a `kid`-keyed single-flight cache so concurrent
//! verifications never issue duplicate JWKS fetches (§5).

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use log::{debug, warn};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

use crate::models::context::Principal;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JwtVerifyError {
    InvalidSignature,
    Expired,
    AudienceMismatch,
    IssuerMismatch,
    Malformed(String),
    JwksUnavailable(String),
}

impl JwtVerifyError {
    pub fn code(&self) -> &'static str {
        match self {
            JwtVerifyError::InvalidSignature => "INVALID_SIGNATURE",
            JwtVerifyError::Expired => "EXPIRED",
            JwtVerifyError::AudienceMismatch => "AUDIENCE_MISMATCH",
            JwtVerifyError::IssuerMismatch => "ISSUER_MISMATCH",
            JwtVerifyError::Malformed(_) => "MALFORMED",
            JwtVerifyError::JwksUnavailable(_) => "JWKS_UNAVAILABLE",
        }
    }
}

impl std::fmt::Display for JwtVerifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtVerifyError::Malformed(m) => write!(f, "malformed token: {m}"),
            JwtVerifyError::JwksUnavailable(m) => write!(f, "jwks unavailable: {m}"),
            other => write!(f, "{}", other.code()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: usize,
    #[serde(default)]
    iat: Option<usize>,
    #[serde(default)]
    nbf: Option<usize>,
    iss: String,
    #[serde(default)]
    aud: Option<serde_json::Value>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default)]
    permissions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    n: String,
    e: String,
}

#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<Jwk>,
}

static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(reqwest::Client::new);

/// Read-mostly `kid -> DecodingKey` cache with a single-flight refresh lock
/// so concurrent misses for the same (or different) `kid` trigger exactly
/// one in-flight JWKS fetch at a time (§5).
struct JwksCache {
    keys: RwLock<HashMap<String, DecodingKey>>,
    refresh_lock: Mutex<()>,
}

pub struct JwtVerifier {
    issuer: String,
    audience: String,
    jwks_url: String,
    jwks_timeout: Duration,
    test_mode: bool,
    hmac_secret: Option<String>,
    cache: Arc<JwksCache>,
}

impl JwtVerifier {
    pub fn new(
        issuer: String,
        audience: String,
        jwks_url: String,
        jwks_timeout: Duration,
        test_mode: bool,
        hmac_secret: Option<String>,
    ) -> Self {
        Self {
            issuer,
            audience,
            jwks_url,
            jwks_timeout,
            test_mode,
            hmac_secret,
            cache: Arc::new(JwksCache {
                keys: RwLock::new(HashMap::new()),
                refresh_lock: Mutex::new(()),
            }),
        }
    }

    pub async fn verify(&self, token: &str) -> Result<Principal, JwtVerifyError> {
        let header =
            decode_header(token).map_err(|e| JwtVerifyError::Malformed(e.to_string()))?;

        let decoding_key = if self.test_mode {
            let secret = self
                .hmac_secret
                .as_deref()
                .ok_or_else(|| JwtVerifyError::Malformed("test_mode enabled without hmac_secret".into()))?;
            DecodingKey::from_secret(secret.as_bytes())
        } else {
            let kid = header
                .kid
                .ok_or_else(|| JwtVerifyError::Malformed("token is missing 'kid' header".into()))?;
            self.decoding_key_for_kid(&kid).await?
        };

        let algorithm = if self.test_mode { Algorithm::HS256 } else { Algorithm::RS256 };
        let mut validation = Validation::new(algorithm);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["sub", "exp", "iss"]);

        let data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
            use jsonwebtoken::errors::ErrorKind;
            match e.kind() {
                ErrorKind::ExpiredSignature => JwtVerifyError::Expired,
                ErrorKind::InvalidSignature => JwtVerifyError::InvalidSignature,
                ErrorKind::InvalidAudience => JwtVerifyError::AudienceMismatch,
                ErrorKind::InvalidIssuer => JwtVerifyError::IssuerMismatch,
                _ => JwtVerifyError::Malformed(e.to_string()),
            }
        })?;

        Ok(Principal {
            subject: data.claims.sub,
            email: data.claims.email,
            name: data.claims.name,
            permissions: data.claims.permissions,
            roles: data.claims.roles,
            raw_token: token.to_string(),
        })
    }

    async fn decoding_key_for_kid(&self, kid: &str) -> Result<DecodingKey, JwtVerifyError> {
        if let Some(key) = self.cache.keys.read().await.get(kid) {
            return Ok(key.clone());
        }

        let _guard = self.cache.refresh_lock.lock().await;
        // Re-check: another caller may have populated the cache while we
        // waited for the refresh lock.
        if let Some(key) = self.cache.keys.read().await.get(kid) {
            return Ok(key.clone());
        }

        debug!("fetching JWKS from {}", self.jwks_url);
        let response = HTTP_CLIENT
            .get(&self.jwks_url)
            .timeout(self.jwks_timeout)
            .send()
            .await
            .map_err(|e| JwtVerifyError::JwksUnavailable(e.to_string()))?;

        let jwks: JwksResponse = response
            .json()
            .await
            .map_err(|e| JwtVerifyError::JwksUnavailable(e.to_string()))?;

        let mut fresh = HashMap::with_capacity(jwks.keys.len());
        for jwk in jwks.keys {
            match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
                Ok(key) => {
                    fresh.insert(jwk.kid, key);
                }
                Err(e) => warn!("skipping malformed JWK: {e}"),
            }
        }

        let found = fresh.get(kid).cloned();
        *self.cache.keys.write().await = fresh;

        found.ok_or_else(|| JwtVerifyError::Malformed(format!("no JWKS key for kid '{kid}'")))
    }
}

/// Best-effort, signature-blind extraction of the `sub` claim, used only by
/// the login-attempt tracker to know *which* user to count a failure
/// against when full verification has already failed (§4.6). Never used
/// for authorization decisions.
pub fn extract_unverified_subject(token: &str) -> Option<String> {
    let payload_segment = token.split('.').nth(1)?;
    let decoded = base64::Engine::decode(
        &base64::engine::general_purpose::URL_SAFE_NO_PAD,
        payload_segment,
    )
    .ok()?;
    let value: serde_json::Value = serde_json::from_slice(&decoded).ok()?;
    value.get("sub")?.as_str().map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn now() -> usize {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() as usize
    }

    #[tokio::test]
    async fn test_mode_accepts_valid_hs256_token() {
        let verifier = JwtVerifier::new(
            "https://issuer.example/".to_string(),
            "api-clients".to_string(),
            "https://issuer.example/.well-known/jwks.json".to_string(),
            Duration::from_secs(3),
            true,
            Some("a-test-secret-value".to_string()),
        );

        let claims = Claims {
            sub: "user-1".to_string(),
            exp: now() + 3600,
            iat: Some(now()),
            nbf: None,
            iss: "https://issuer.example/".to_string(),
            aud: Some(serde_json::json!("api-clients")),
            email: Some("user1@example.com".to_string()),
            name: None,
            roles: vec!["admin".to_string()],
            permissions: vec![],
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"a-test-secret-value"),
        )
        .unwrap();

        let principal = verifier.verify(&token).await.unwrap();
        assert_eq!(principal.subject, "user-1");
        assert!(principal.roles.contains(&"admin".to_string()));
    }

    #[tokio::test]
    async fn test_mode_rejects_expired_token() {
        let verifier = JwtVerifier::new(
            "https://issuer.example/".to_string(),
            "api-clients".to_string(),
            "https://issuer.example/.well-known/jwks.json".to_string(),
            Duration::from_secs(3),
            true,
            Some("a-test-secret-value".to_string()),
        );
        let claims = Claims {
            sub: "user-1".to_string(),
            exp: now() - 10,
            iat: Some(now() - 100),
            nbf: None,
            iss: "https://issuer.example/".to_string(),
            aud: Some(serde_json::json!("api-clients")),
            email: None,
            name: None,
            roles: vec![],
            permissions: vec![],
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"a-test-secret-value"),
        )
        .unwrap();

        let err = verifier.verify(&token).await.unwrap_err();
        assert_eq!(err, JwtVerifyError::Expired);
    }
}
