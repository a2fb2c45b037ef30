// asset-gateway/src/session.rs
use actix_web::{http::header, HttpRequest};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use common::{validate_session_token, SessionClaims, SessionConfig, SessionPayload, TokenError};
use std::sync::Arc;

// Largest leeway chrono can represent as a Duration
const MAX_LEEWAY_SECS: u64 = i64::MAX as u64 / 1_000;

/// Signature/expiry check over a raw token. Any error means "no session".
#[async_trait(?Send)]
pub trait SignedPayloadVerifier: Send + Sync {
    async fn verify_signed_payload(&self, token: &str) -> Result<SessionClaims, TokenError>;
}

/// HS256 tokens signed with a shared secret
pub struct JwtVerifier {
    secret: Vec<u8>,
    leeway_secs: u64,
}

impl JwtVerifier {
    pub fn new(secret: impl Into<Vec<u8>>, leeway_secs: u64) -> Self {
        Self {
            secret: secret.into(),
            leeway_secs,
        }
    }
}

#[async_trait(?Send)]
impl SignedPayloadVerifier for JwtVerifier {
    async fn verify_signed_payload(&self, token: &str) -> Result<SessionClaims, TokenError> {
        validate_session_token(token, &self.secret, self.leeway_secs)
    }
}

/// Finds the session token on a request and verifies it.
///
/// Absent, malformed, badly signed and expired tokens all come back as `None`;
/// callers never learn which.
#[derive(Clone)]
pub struct SessionTokenVerifier {
    primitive: Arc<dyn SignedPayloadVerifier>,
    cookie_name: String,
    accept_bearer: bool,
    leeway: Duration,
}

impl SessionTokenVerifier {
    pub fn new(primitive: Arc<dyn SignedPayloadVerifier>, config: &SessionConfig) -> Self {
        Self {
            primitive,
            cookie_name: config.cookie_name.clone(),
            accept_bearer: config.accept_bearer,
            leeway: Duration::seconds(config.leeway_secs.min(MAX_LEEWAY_SECS) as i64),
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        let primitive = Arc::new(JwtVerifier::new(config.secret.as_bytes(), config.leeway_secs));
        Self::new(primitive, config)
    }

    // Cookie first, then the Authorization header
    pub fn extract_token(&self, req: &HttpRequest) -> Option<String> {
        if let Some(cookie) = req.cookie(&self.cookie_name) {
            if !cookie.value().is_empty() {
                return Some(cookie.value().to_string());
            }
        }

        if !self.accept_bearer {
            return None;
        }

        req.headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
    }

    pub async fn verify(&self, req: &HttpRequest) -> Option<SessionPayload> {
        let token = self.extract_token(req)?;
        self.verify_token(&token).await
    }

    pub async fn verify_token(&self, token: &str) -> Option<SessionPayload> {
        let claims = match self.primitive.verify_signed_payload(token).await {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!("Session token rejected: {}", e);
                return None;
            }
        };

        let payload = SessionPayload::from_claims(claims)?;
        if payload.is_expired_at(Utc::now() - self.leeway) {
            tracing::debug!("Session token expired");
            return None;
        }
        Some(payload)
    }
}
