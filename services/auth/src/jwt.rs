//! Token signer for access and refresh tokens
//!
//! Access tokens are compact HS256 JWTs carrying only the subject, issue time
//! and expiry. Refresh tokens are opaque random strings; everything about them
//! (owner, expiry, revocation) lives in the session store.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use rand::{RngCore, rngs::OsRng};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use crate::config::AuthConfig;

/// Bytes of entropy in a refresh token
pub const REFRESH_TOKEN_BYTES: usize = 32;

/// Access token claims
///
/// Every field is required; a token missing one, or carrying one with the
/// wrong type, fails deserialization and is rejected as malformed.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    /// Issued at time
    pub iat: i64,
    /// Expiration time
    pub exp: i64,
}

/// Reasons an access token is rejected
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessTokenError {
    #[error("token signature does not match")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("token is malformed")]
    Malformed,
}

/// Errors raised while minting tokens
#[derive(Debug, Error)]
pub enum IssueError {
    #[error("Failed to sign access token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
    #[error("Entropy source unavailable: {0}")]
    Entropy(#[from] rand::Error),
}

/// Creates and verifies access tokens and mints refresh tokens
#[derive(Clone)]
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_token_ttl: u64,
}

impl TokenSigner {
    /// Build a signer around the configured secret and access TTL
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.expose_secret().as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            access_token_ttl: config.access_token_ttl,
        }
    }

    /// Access token lifetime in seconds
    pub fn access_token_ttl(&self) -> u64 {
        self.access_token_ttl
    }

    /// Issue a signed access token for `subject`
    pub fn issue_access_token(&self, subject: Uuid) -> Result<SecretString, IssueError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: subject,
            iat: now,
            exp: now.saturating_add(i64::try_from(self.access_token_ttl).unwrap_or(i64::MAX)),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok(SecretString::from(token))
    }

    /// Verify an access token and return its subject
    pub fn verify_access_token(&self, token: &str) -> Result<Uuid, AccessTokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims.sub)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => AccessTokenError::InvalidSignature,
                ErrorKind::ExpiredSignature => AccessTokenError::Expired,
                ErrorKind::Crypto(_) => {
                    error!("Crypto failure while verifying access token");
                    AccessTokenError::InvalidSignature
                }
                _ => AccessTokenError::Malformed,
            })
    }

    /// Mint an opaque, URL-safe refresh token
    pub fn generate_refresh_token(&self) -> Result<SecretString, IssueError> {
        let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
        OsRng.try_fill_bytes(&mut bytes)?;
        Ok(SecretString::from(URL_SAFE_NO_PAD.encode(bytes)))
    }
}
