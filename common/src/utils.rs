// Common Crate - utils.rs
// common/src/utils.rs
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::models::session::SessionClaims;

/// Setup tracing for consistent logging across services.
///
/// `RUST_LOG` takes precedence over `default_filter`.
pub fn setup_tracing(default_filter: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .finish()
        .try_init()
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("no signing secret configured")]
    EmptySecret,
    #[error("token rejected: {0}")]
    Rejected(#[from] jsonwebtoken::errors::Error),
}

// Validate an HS256 session token and return its claims.
// Signature, shape and `exp` are all checked here.
pub fn validate_session_token(
    token: &str,
    secret: &[u8],
    leeway_secs: u64,
) -> Result<SessionClaims, TokenError> {
    if secret.is_empty() {
        return Err(TokenError::EmptySecret);
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = leeway_secs;
    validation.set_required_spec_claims(&["exp"]);

    let token_data = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret),
        &validation,
    )?;

    Ok(token_data.claims)
}
