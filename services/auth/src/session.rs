//! Session lifecycle: register, login, refresh rotation and logout
//!
//! The manager keeps no mutable state of its own. Everything about a session
//! lives in the [`SessionStore`], so concurrent requests are only as
//! consistent as the store's transactions, which is why rotation and bulk
//! revocation are single store calls.

use std::sync::Arc;

use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    config::AuthConfig,
    error::{AuthError, AuthResult},
    jwt::TokenSigner,
    models::{NewUser, RefreshSession, TokenPair, UserProfile},
    password,
    repositories::{
        REFRESH_SESSIONS_TOKEN_KEY, RotationOutcome, SessionStore, StoreError, USERS_EMAIL_KEY,
    },
    validation,
};

/// Attempts at minting a refresh token that does not collide with a stored one
const TOKEN_INSERT_ATTEMPTS: usize = 3;

/// Registration input
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: SecretString,
    pub age: i32,
}

/// Orchestrates hashing, signing and the session store
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    signer: TokenSigner,
    refresh_token_ttl: u64,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new(store: Arc<dyn SessionStore>, config: &AuthConfig) -> Self {
        Self {
            store,
            signer: TokenSigner::new(config),
            refresh_token_ttl: config.refresh_token_ttl,
        }
    }

    /// Signer used for access tokens
    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    /// The store this manager writes to
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Create an account; the returned profile carries no credential fields
    pub async fn register(&self, registration: Registration) -> AuthResult<UserProfile> {
        validation::validate_name(&registration.name).map_err(AuthError::Validation)?;
        validation::validate_email(&registration.email).map_err(AuthError::Validation)?;
        validation::validate_password(registration.password.expose_secret())
            .map_err(AuthError::Validation)?;
        validation::validate_age(registration.age).map_err(AuthError::Validation)?;

        let password_hash = password::hash_password(&registration.password)?;

        let new_user = NewUser {
            name: registration.name,
            email: registration.email,
            password_hash,
            age: registration.age,
        };

        let user = self
            .store
            .create_user(&new_user)
            .await
            .map_err(|e| match e {
                StoreError::Duplicate(ref key) if key == USERS_EMAIL_KEY => {
                    AuthError::DuplicateEmail
                }
                other => AuthError::Storage(other),
            })?;

        info!(user_id = %user.id, "Registered new user");
        Ok(user.profile())
    }

    /// Authenticate by email and password and open a new session
    pub async fn login(
        &self,
        email: &str,
        password: &SecretString,
        device_info: &str,
    ) -> AuthResult<TokenPair> {
        if email.is_empty() {
            return Err(AuthError::Validation("Email is required".to_string()));
        }
        if password.expose_secret().is_empty() {
            return Err(AuthError::Validation("Password is required".to_string()));
        }

        let Some(user) = self.store.find_user_by_email(email).await? else {
            password::verify_dummy(password);
            warn!("Login rejected");
            return Err(AuthError::InvalidCredentials);
        };

        if !password::verify_password(password, &user.password_hash) {
            warn!(user_id = %user.id, "Login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        let access_token = self.signer.issue_access_token(user.id)?;
        let session = self.open_session(user.id, device_info).await?;

        info!(user_id = %user.id, session_id = %session.id, "User logged in");
        Ok(self.token_pair(access_token, session))
    }

    /// Exchange a refresh token for a new pair, consuming the old token
    pub async fn refresh(&self, refresh_token: &str, device_info: &str) -> AuthResult<TokenPair> {
        let session = self
            .store
            .get_refresh_session(refresh_token)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if !session.is_active(Utc::now()) {
            warn!(session_id = %session.id, "Refresh with inactive session rejected");
            return Err(AuthError::ExpiredToken);
        }

        let user = self
            .store
            .find_user_by_id(session.user_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        let mut attempt = 0;
        let replacement = loop {
            attempt += 1;
            let now = Utc::now();
            let candidate = RefreshSession::new(
                user.id,
                self.signer.generate_refresh_token()?.expose_secret().to_string(),
                device_info.to_string(),
                self.refresh_token_ttl,
                now,
            );

            match self
                .store
                .rotate_refresh_session(refresh_token, &candidate, now)
                .await
            {
                Ok(RotationOutcome::Rotated) => break candidate,
                Ok(RotationOutcome::Stale) => {
                    warn!(session_id = %session.id, "Refresh lost rotation race");
                    return Err(AuthError::ExpiredToken);
                }
                Ok(RotationOutcome::NotFound) => return Err(AuthError::InvalidToken),
                Err(StoreError::Duplicate(ref key))
                    if key == REFRESH_SESSIONS_TOKEN_KEY && attempt < TOKEN_INSERT_ATTEMPTS =>
                {
                    warn!("Refresh token collision, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        };

        let access_token = self.signer.issue_access_token(user.id)?;

        info!(
            user_id = %user.id,
            consumed = %session.id,
            session_id = %replacement.id,
            "Rotated refresh session"
        );
        Ok(self.token_pair(access_token, replacement))
    }

    /// Revoke the presented session, or every session of its owner
    ///
    /// Revoking an already revoked session succeeds.
    pub async fn logout(&self, refresh_token: &str, logout_all: bool) -> AuthResult<()> {
        let mut session = self
            .store
            .get_refresh_session(refresh_token)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if logout_all {
            let revoked = self
                .store
                .revoke_all_sessions_for_user(session.user_id)
                .await?;
            info!(user_id = %session.user_id, revoked, "Logged out of all sessions");
            return Ok(());
        }

        if !session.revoked {
            session.revoke(Utc::now());
            self.store.update_refresh_session(&session).await?;
        }

        info!(user_id = %session.user_id, session_id = %session.id, "Logged out");
        Ok(())
    }

    /// Verify an access token and return its subject
    pub fn validate_access_token(&self, token: &str) -> AuthResult<Uuid> {
        self.signer
            .verify_access_token(token)
            .map_err(|_| AuthError::Unauthorized)
    }

    /// Profile of an authenticated subject
    pub async fn current_user(&self, user_id: Uuid) -> AuthResult<UserProfile> {
        self.store
            .find_user_by_id(user_id)
            .await?
            .map(|user| user.profile())
            .ok_or(AuthError::Unauthorized)
    }

    async fn open_session(&self, user_id: Uuid, device_info: &str) -> AuthResult<RefreshSession> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let session = RefreshSession::new(
                user_id,
                self.signer.generate_refresh_token()?.expose_secret().to_string(),
                device_info.to_string(),
                self.refresh_token_ttl,
                Utc::now(),
            );

            match self.store.save_refresh_session(&session).await {
                Ok(()) => return Ok(session),
                Err(StoreError::Duplicate(ref key))
                    if key == REFRESH_SESSIONS_TOKEN_KEY && attempt < TOKEN_INSERT_ATTEMPTS =>
                {
                    warn!("Refresh token collision, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn token_pair(&self, access_token: SecretString, session: RefreshSession) -> TokenPair {
        TokenPair {
            access_token,
            refresh_token: SecretString::from(session.token),
            expires_in: self.signer.access_token_ttl(),
        }
    }
}
