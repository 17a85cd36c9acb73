//! Middleware for access token validation and authentication

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{AppState, error::AuthError, jwt::TokenSigner};

/// Subject of a verified access token, placed in request extensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub Uuid);

/// Why a request could not be authenticated
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthenticatorError {
    #[error("missing authorization header")]
    MissingCredential,
    #[error("invalid authorization header format")]
    MalformedCredential,
    #[error("unauthorized")]
    Unauthorized,
}

/// Pull the bearer token out of the `Authorization` header
pub fn bearer_token(headers: &HeaderMap) -> Result<String, AuthenticatorError> {
    if !headers.contains_key(AUTHORIZATION) {
        return Err(AuthenticatorError::MissingCredential);
    }

    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|Authorization(bearer)| bearer.token().to_string())
        .ok_or(AuthenticatorError::MalformedCredential)
}

/// Authenticate a request from its headers
pub fn authenticate(
    headers: &HeaderMap,
    signer: &TokenSigner,
) -> Result<AuthenticatedUser, AuthenticatorError> {
    let token = bearer_token(headers)?;

    signer
        .verify_access_token(&token)
        .map(AuthenticatedUser)
        .map_err(|e| {
            warn!("Rejected access token: {}", e);
            AuthenticatorError::Unauthorized
        })
}

/// Reject unauthenticated requests, otherwise expose [`AuthenticatedUser`]
/// to downstream handlers
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let user = authenticate(req.headers(), state.manager.signer()).map_err(|e| {
        debug!("Request not authenticated: {}", e);
        AuthError::Unauthorized
    })?;

    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}
