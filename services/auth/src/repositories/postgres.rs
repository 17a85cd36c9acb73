//! PostgreSQL session store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::DatabaseError;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use tracing::{error, info};
use uuid::Uuid;

use super::{RotationOutcome, SessionStore, StoreResult};
use crate::models::{NewUser, RefreshSession, User};

const USER_COLUMNS: &str = "id, name, email, password_hash, age, created_at, updated_at";
const SESSION_COLUMNS: &str =
    "id, token, user_id, expires_at, revoked, device_info, created_at, updated_at";

/// Session store backed by PostgreSQL
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    /// Create a new store over an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Underlying connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the bundled schema migrations
    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))
    }

    /// Lock the user row so rotation and bulk revocation for the same user
    /// run one after the other
    async fn lock_user(tx: &mut Transaction<'_, Postgres>, user_id: Uuid) -> StoreResult<bool> {
        let row = sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(row.is_some())
    }
}

fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        age: row.get("age"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn session_from_row(row: &PgRow) -> RefreshSession {
    RefreshSession {
        id: row.get("id"),
        token: row.get("token"),
        user_id: row.get("user_id"),
        expires_at: row.get("expires_at"),
        revoked: row.get("revoked"),
        device_info: row.get("device_info"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

async fn insert_session<'e, E>(executor: E, session: &RefreshSession) -> StoreResult<()>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO refresh_sessions
            (id, token, user_id, expires_at, revoked, device_info, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(session.id)
    .bind(&session.token)
    .bind(session.user_id)
    .bind(session.expires_at)
    .bind(session.revoked)
    .bind(&session.device_info)
    .bind(session.created_at)
    .bind(session.updated_at)
    .execute(executor)
    .await?;

    Ok(())
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create_user(&self, new_user: &NewUser) -> StoreResult<User> {
        let query = format!(
            r#"
            INSERT INTO users (id, name, email, password_hash, age)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        );

        let row = sqlx::query(&query)
            .bind(Uuid::new_v4())
            .bind(&new_user.name)
            .bind(&new_user.email)
            .bind(&new_user.password_hash)
            .bind(new_user.age)
            .fetch_one(&self.pool)
            .await?;

        Ok(user_from_row(&row))
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<bool> {
        // refresh_sessions.user_id cascades on delete
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn save_refresh_session(&self, session: &RefreshSession) -> StoreResult<()> {
        insert_session(&self.pool, session).await
    }

    async fn get_refresh_session(&self, token: &str) -> StoreResult<Option<RefreshSession>> {
        let query = format!("SELECT {SESSION_COLUMNS} FROM refresh_sessions WHERE token = $1");
        let row = sqlx::query(&query)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(session_from_row))
    }

    async fn update_refresh_session(&self, session: &RefreshSession) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE refresh_sessions
            SET revoked = revoked OR $2,
                updated_at = CASE WHEN revoked THEN updated_at ELSE $3 END
            WHERE token = $1
            "#,
        )
        .bind(&session.token)
        .bind(session.revoked)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn revoke_all_sessions_for_user(&self, user_id: Uuid) -> StoreResult<u64> {
        let mut tx = self.pool.begin().await?;

        if !Self::lock_user(&mut tx, user_id).await? {
            tx.rollback().await?;
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            UPDATE refresh_sessions
            SET revoked = TRUE, updated_at = now()
            WHERE user_id = $1 AND revoked = FALSE
            "#,
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    async fn delete_refresh_session(&self, token: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM refresh_sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn rotate_refresh_session(
        &self,
        consumed_token: &str,
        replacement: &RefreshSession,
        now: DateTime<Utc>,
    ) -> StoreResult<RotationOutcome> {
        let mut tx = self.pool.begin().await?;

        let owner: Option<Uuid> =
            sqlx::query_scalar("SELECT user_id FROM refresh_sessions WHERE token = $1")
                .bind(consumed_token)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(owner) = owner else {
            tx.rollback().await?;
            return Ok(RotationOutcome::NotFound);
        };

        if !Self::lock_user(&mut tx, owner).await? {
            tx.rollback().await?;
            return Ok(RotationOutcome::NotFound);
        }

        // Re-checked under the user lock: a concurrent rotation or bulk
        // revocation that committed first leaves nothing to update.
        let consumed = sqlx::query(
            r#"
            UPDATE refresh_sessions
            SET revoked = TRUE, updated_at = $2
            WHERE token = $1 AND revoked = FALSE AND expires_at >= $2
            RETURNING id
            "#,
        )
        .bind(consumed_token)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        if consumed.is_none() {
            tx.rollback().await?;
            return Ok(RotationOutcome::Stale);
        }

        if let Err(e) = insert_session(&mut *tx, replacement).await {
            error!("Failed to insert rotated session: {}", e);
            tx.rollback().await?;
            return Err(e);
        }

        tx.commit().await?;
        Ok(RotationOutcome::Rotated)
    }

    async fn health_check(&self) -> StoreResult<bool> {
        Ok(common::database::health_check(self.pool()).await?)
    }
}
