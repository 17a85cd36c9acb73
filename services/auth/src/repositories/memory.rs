//! In-process session store
//!
//! All state sits behind one mutex, so every operation is trivially atomic and
//! rotation and bulk revocation can never interleave.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    REFRESH_SESSIONS_TOKEN_KEY, RotationOutcome, SessionStore, StoreError, StoreResult,
    USERS_EMAIL_KEY,
};
use crate::models::{NewUser, RefreshSession, User};

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    user_ids_by_email: HashMap<String, Uuid>,
    sessions: HashMap<String, RefreshSession>,
}

/// Session store kept in memory
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    state: Arc<Mutex<State>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All sessions of a user, in no particular order
    pub async fn sessions_for_user(&self, user_id: Uuid) -> Vec<RefreshSession> {
        let state = self.state.lock().await;
        state
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create_user(&self, new_user: &NewUser) -> StoreResult<User> {
        let mut state = self.state.lock().await;

        if state.user_ids_by_email.contains_key(&new_user.email) {
            return Err(StoreError::Duplicate(USERS_EMAIL_KEY.to_string()));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name.clone(),
            email: new_user.email.clone(),
            password_hash: new_user.password_hash.clone(),
            age: new_user.age,
            created_at: now,
            updated_at: now,
        };

        state.user_ids_by_email.insert(user.email.clone(), user.id);
        state.users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state
            .user_ids_by_email
            .get(email)
            .and_then(|id| state.users.get(id))
            .cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.get(&id).cloned())
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.lock().await;

        let Some(user) = state.users.remove(&id) else {
            return Ok(false);
        };
        state.user_ids_by_email.remove(&user.email);
        state.sessions.retain(|_, session| session.user_id != id);

        Ok(true)
    }

    async fn save_refresh_session(&self, session: &RefreshSession) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        insert_session(&mut state, session)
    }

    async fn get_refresh_session(&self, token: &str) -> StoreResult<Option<RefreshSession>> {
        let state = self.state.lock().await;
        Ok(state.sessions.get(token).cloned())
    }

    async fn update_refresh_session(&self, session: &RefreshSession) -> StoreResult<()> {
        let mut state = self.state.lock().await;

        if let Some(stored) = state.sessions.get_mut(&session.token) {
            if session.revoked {
                stored.revoke(session.updated_at);
            }
        }

        Ok(())
    }

    async fn revoke_all_sessions_for_user(&self, user_id: Uuid) -> StoreResult<u64> {
        let mut state = self.state.lock().await;
        let now = Utc::now();

        let mut revoked = 0;
        for session in state.sessions.values_mut() {
            if session.user_id == user_id && !session.revoked {
                session.revoke(now);
                revoked += 1;
            }
        }

        Ok(revoked)
    }

    async fn delete_refresh_session(&self, token: &str) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        state.sessions.remove(token);
        Ok(())
    }

    async fn rotate_refresh_session(
        &self,
        consumed_token: &str,
        replacement: &RefreshSession,
        now: DateTime<Utc>,
    ) -> StoreResult<RotationOutcome> {
        let mut state = self.state.lock().await;

        match state.sessions.get(consumed_token) {
            None => return Ok(RotationOutcome::NotFound),
            Some(consumed) if !consumed.is_active(now) => return Ok(RotationOutcome::Stale),
            Some(_) => {}
        }

        insert_session(&mut state, replacement)?;
        if let Some(consumed) = state.sessions.get_mut(consumed_token) {
            consumed.revoke(now);
        }

        Ok(RotationOutcome::Rotated)
    }

    async fn health_check(&self) -> StoreResult<bool> {
        Ok(true)
    }
}

fn insert_session(state: &mut State, session: &RefreshSession) -> StoreResult<()> {
    if state.sessions.contains_key(&session.token) {
        return Err(StoreError::Duplicate(REFRESH_SESSIONS_TOKEN_KEY.to_string()));
    }
    state
        .sessions
        .insert(session.token.clone(), session.clone());
    Ok(())
}
