//! Refresh session model and issued token pairs

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use secrecy::SecretString;
use uuid::Uuid;

/// One issued refresh token
///
/// The token string is the lookup key and never changes. `revoked` only ever
/// moves from `false` to `true`, and `expires_at` is fixed at creation:
/// rotation creates a new record instead of extending this one.
#[derive(Clone)]
pub struct RefreshSession {
    pub id: Uuid,
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub device_info: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RefreshSession {
    /// Fresh, active session for `user_id` expiring `ttl_seconds` from `now`
    pub fn new(
        user_id: Uuid,
        token: String,
        device_info: String,
        ttl_seconds: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            token,
            user_id,
            expires_at: expiry_after(now, ttl_seconds),
            revoked: false,
            device_info,
            created_at: now,
            updated_at: now,
        }
    }

    /// Not revoked and not past its expiry
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && now <= self.expires_at
    }

    /// Mark the session revoked; a no-op when already revoked
    pub fn revoke(&mut self, now: DateTime<Utc>) {
        if !self.revoked {
            self.revoked = true;
            self.updated_at = now;
        }
    }
}

/// `now + ttl_seconds`, saturating at the latest representable instant
fn expiry_after(now: DateTime<Utc>, ttl_seconds: u64) -> DateTime<Utc> {
    i64::try_from(ttl_seconds)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl fmt::Debug for RefreshSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshSession")
            .field("id", &self.id)
            .field("token", &"[REDACTED]")
            .field("user_id", &self.user_id)
            .field("expires_at", &self.expires_at)
            .field("revoked", &self.revoked)
            .field("device_info", &self.device_info)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Access/refresh pair handed back by login and refresh
#[derive(Debug)]
pub struct TokenPair {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    /// Access token lifetime in seconds
    pub expires_in: u64,
}

impl TokenPair {
    pub const TOKEN_TYPE: &'static str = "Bearer";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_active_until_expiry() {
        let now = Utc::now();
        let session = RefreshSession::new(
            Uuid::new_v4(),
            "tok".to_string(),
            "laptop".to_string(),
            60,
            now,
        );

        assert!(!session.revoked);
        assert_eq!(session.expires_at, now + Duration::seconds(60));
        assert!(session.is_active(now));
        assert!(session.is_active(now + Duration::seconds(60)));
        assert!(!session.is_active(now + Duration::seconds(61)));
    }

    #[test]
    fn test_oversized_ttl_saturates() {
        let now = Utc::now();

        for ttl in [100_000_000_000_000_000, i64::MAX as u64, u64::MAX] {
            let session =
                RefreshSession::new(Uuid::new_v4(), "tok".to_string(), String::new(), ttl, now);
            assert_eq!(session.expires_at, DateTime::<Utc>::MAX_UTC, "{ttl}");
            assert!(session.is_active(now));
        }
    }

    #[test]
    fn test_revoke_is_terminal_and_idempotent() {
        let now = Utc::now();
        let mut session =
            RefreshSession::new(Uuid::new_v4(), "tok".to_string(), String::new(), 60, now);

        let later = now + Duration::seconds(5);
        session.revoke(later);
        assert!(session.revoked);
        assert_eq!(session.updated_at, later);
        assert!(!session.is_active(now));

        session.revoke(later + Duration::seconds(5));
        assert!(session.revoked);
        assert_eq!(session.updated_at, later);
    }

    #[test]
    fn test_debug_redacts_token() {
        let session = RefreshSession::new(
            Uuid::new_v4(),
            "very-secret-refresh-token".to_string(),
            "phone".to_string(),
            60,
            Utc::now(),
        );
        let rendered = format!("{:?}", session);
        assert!(rendered.contains("phone"));
        assert!(!rendered.contains("very-secret-refresh-token"));
    }
}
