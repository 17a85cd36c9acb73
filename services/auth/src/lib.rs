//! Credential and session-lifecycle service
//!
//! Passwords are hashed with Argon2, access tokens are short-lived HS256 JWTs,
//! and refresh tokens are opaque strings whose state lives in a
//! [`repositories::SessionStore`]. Every successful refresh rotates the token.

pub mod config;
pub mod error;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod repositories;
pub mod routes;
pub mod session;
pub mod validation;

use session::SessionManager;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub manager: SessionManager,
}

impl AppState {
    pub fn new(manager: SessionManager) -> Self {
        Self { manager }
    }
}
