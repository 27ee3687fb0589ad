use std::time::Duration;

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::{auth::claims::Claims, config::JwtConfig};

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Malformed,
        }
    }
}

/// Upper bound on token lifetime, one year.
pub const MAX_TTL_MINUTES: i64 = 60 * 24 * 365;

/// Signing and verification keys derived from [`JwtConfig`].
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            ttl: Duration::from_secs(
                (cfg.ttl_minutes.clamp(0, MAX_TTL_MINUTES) as u64).saturating_mul(60),
            ),
        }
    }

    pub fn issue(&self, user_id: Uuid, name: &str) -> Result<String, TokenError> {
        self.issue_at(user_id, name, OffsetDateTime::now_utc().unix_timestamp())
    }

    pub fn issue_at(&self, user_id: Uuid, name: &str, now: i64) -> Result<String, TokenError> {
        let claims = Claims {
            id: user_id,
            name: name.to_string(),
            iat: now,
            exp: now.saturating_add(self.ttl.as_secs() as i64),
            jti: Uuid::new_v4(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(TokenError::Signing)?;
        debug!(user_id = %user_id, exp = claims.exp, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, OffsetDateTime::now_utc().unix_timestamp())
    }

    /// Expiry is checked here rather than by `jsonwebtoken`, which
    /// accepts `now == exp` and applies leeway.
    pub fn verify_at(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        if token.trim().is_empty() || token.split('.').count() != 3 {
            return Err(TokenError::Malformed);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        let data = decode::<Claims>(token, &self.decoding, &validation)?;

        if now >= data.claims.exp {
            debug!(user_id = %data.claims.id, exp = data.claims.exp, now, "jwt expired");
            return Err(TokenError::Expired);
        }
        debug!(user_id = %data.claims.id, "jwt verified");
        Ok(data.claims)
    }
}
