//! Session store: persistence of users and refresh sessions

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::DatabaseError;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{NewUser, RefreshSession, User};

pub mod memory;
pub mod postgres;

pub use memory::InMemorySessionStore;
pub use postgres::PgSessionStore;

/// Unique constraint on `users.email`
pub const USERS_EMAIL_KEY: &str = "users_email_key";
/// Unique constraint on `refresh_sessions.token`
pub const REFRESH_SESSIONS_TOKEN_KEY: &str = "refresh_sessions_token_key";

/// Store failures
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint rejected the write
    #[error("Unique constraint violated: {0}")]
    Duplicate(String),

    /// Any other infrastructure failure
    #[error(transparent)]
    Database(DatabaseError),
}

impl From<DatabaseError> for StoreError {
    fn from(err: DatabaseError) -> Self {
        match err.unique_violation() {
            Some(constraint) => StoreError::Duplicate(constraint),
            None => StoreError::Database(err),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        DatabaseError::Query(err).into()
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of an atomic rotation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationOutcome {
    /// The consumed session was revoked and the replacement stored
    Rotated,
    /// The consumed session was already revoked or expired; nothing changed
    Stale,
    /// No session carries the consumed token
    NotFound,
}

/// Durable store backing the session manager
///
/// Implementations must make [`SessionStore::rotate_refresh_session`] and
/// [`SessionStore::revoke_all_sessions_for_user`] atomic, and must serialise
/// them against each other for the same user.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a user; `Duplicate(USERS_EMAIL_KEY)` if the email is taken
    async fn create_user(&self, user: &NewUser) -> StoreResult<User>;

    /// Exact-match lookup by email
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Delete a user and, with it, all of their refresh sessions
    async fn delete_user(&self, id: Uuid) -> StoreResult<bool>;

    /// Insert a session; `Duplicate(REFRESH_SESSIONS_TOKEN_KEY)` on token collision
    async fn save_refresh_session(&self, session: &RefreshSession) -> StoreResult<()>;

    async fn get_refresh_session(&self, token: &str) -> StoreResult<Option<RefreshSession>>;

    /// Persist the session's revoked flag. A stored `true` is never reset.
    async fn update_refresh_session(&self, session: &RefreshSession) -> StoreResult<()>;

    /// Revoke every session of `user_id`; returns how many were still unrevoked
    async fn revoke_all_sessions_for_user(&self, user_id: Uuid) -> StoreResult<u64>;

    /// Physically remove a session row
    async fn delete_refresh_session(&self, token: &str) -> StoreResult<()>;

    /// Revoke `consumed_token` if it is still active at `now` and insert
    /// `replacement`, both or neither.
    async fn rotate_refresh_session(
        &self,
        consumed_token: &str,
        replacement: &RefreshSession,
        now: DateTime<Utc>,
    ) -> StoreResult<RotationOutcome>;

    async fn health_check(&self) -> StoreResult<bool>;
}
