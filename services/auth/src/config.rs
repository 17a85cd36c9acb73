//! Service configuration

use anyhow::{Result, bail};
use config::{Config, Environment};
use secrecy::{ExposeSecret, SecretString};

/// Default access token lifetime: one hour
pub const DEFAULT_ACCESS_TOKEN_TTL: u64 = 3600;
/// Default refresh token lifetime: 30 days
pub const DEFAULT_REFRESH_TOKEN_TTL: u64 = 2_592_000;
/// Longest accepted token lifetime: one hundred years
pub const MAX_TOKEN_TTL: u64 = 100 * 365 * 24 * 3600;

/// Authentication service configuration
///
/// Built once at start-up and handed to the components that need it.
#[derive(Debug)]
pub struct AuthConfig {
    /// HMAC key for access tokens
    pub jwt_secret: SecretString,
    /// Access token lifetime in seconds
    pub access_token_ttl: u64,
    /// Refresh token lifetime in seconds
    pub refresh_token_ttl: u64,
    /// Address the HTTP server binds to
    pub bind_addr: String,
}

impl AuthConfig {
    /// Configuration with default lifetimes around the given signing secret
    pub fn new(jwt_secret: SecretString) -> Self {
        Self {
            jwt_secret,
            access_token_ttl: DEFAULT_ACCESS_TOKEN_TTL,
            refresh_token_ttl: DEFAULT_REFRESH_TOKEN_TTL,
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }

    /// Load the configuration from `AUTH_`-prefixed environment variables
    ///
    /// # Environment Variables
    /// - `AUTH_JWT_SECRET`: HMAC signing secret (required)
    /// - `AUTH_ACCESS_TOKEN_TTL`: Access token expiry in seconds (default: 3600)
    /// - `AUTH_REFRESH_TOKEN_TTL`: Refresh token expiry in seconds (default: 2592000)
    /// - `AUTH_BIND_ADDR`: Listen address (default: 0.0.0.0:3000)
    pub fn from_env() -> Result<Self> {
        let settings = Config::builder()
            .set_default("access_token_ttl", DEFAULT_ACCESS_TOKEN_TTL as i64)?
            .set_default("refresh_token_ttl", DEFAULT_REFRESH_TOKEN_TTL as i64)?
            .set_default("bind_addr", "0.0.0.0:3000")?
            .add_source(Environment::with_prefix("AUTH"))
            .build()?;

        let jwt_secret = settings
            .get_string("jwt_secret")
            .map_err(|_| anyhow::anyhow!("AUTH_JWT_SECRET environment variable not set"))?;

        let config = Self {
            jwt_secret: SecretString::from(jwt_secret),
            access_token_ttl: settings.get("access_token_ttl")?,
            refresh_token_ttl: settings.get("refresh_token_ttl")?,
            bind_addr: settings.get_string("bind_addr")?,
        };
        config.validate()?;

        Ok(config)
    }

    /// Reject configurations the token engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.jwt_secret.expose_secret().is_empty() {
            bail!("JWT secret must not be empty");
        }
        if self.access_token_ttl == 0 {
            bail!("Access token TTL must be positive");
        }
        if self.access_token_ttl > MAX_TOKEN_TTL {
            bail!("Access token TTL must be at most {} seconds", MAX_TOKEN_TTL);
        }
        if self.refresh_token_ttl == 0 {
            bail!("Refresh token TTL must be positive");
        }
        if self.refresh_token_ttl > MAX_TOKEN_TTL {
            bail!("Refresh token TTL must be at most {} seconds", MAX_TOKEN_TTL);
        }
        Ok(())
    }
}
