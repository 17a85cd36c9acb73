//! Authentication service routes

use axum::{
    Extension, Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{get, post},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    AppState,
    error::{AuthError, AuthResult},
    middleware::{AuthenticatedUser, auth_middleware, bearer_token},
    models::TokenPair,
    session::Registration,
};

/// Header carrying the client's device descriptor
pub const DEVICE_INFO_HEADER: &str = "device-info";

/// Response for token issuance
#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

impl TokenResponse {
    /// The one place token bytes leave the service
    fn expose(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token.expose_secret().to_string(),
            refresh_token: pair.refresh_token.expose_secret().to_string(),
            token_type: TokenPair::TOKEN_TYPE.to_string(),
            expires_in: pair.expires_in,
        }
    }
}

/// Request for user registration
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub age: i32,
}

/// Request for user login
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub device_info: String,
}

/// Request for token refresh
#[derive(Deserialize, Default)]
pub struct RefreshTokenRequest {
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub device_info: String,
}

/// Request for logout
#[derive(Deserialize, Default)]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub logout_all: bool,
}

/// Create the router for the authentication service
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/users/me", get(current_user))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh_token))
        .route("/auth/logout", post(logout))
        .merge(protected)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.manager.store().health_check().await {
        Ok(true) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ok",
                "service": "auth-service"
            })),
        ),
        Ok(false) | Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "unavailable",
                "service": "auth-service"
            })),
        ),
    }
}

/// User registration endpoint
pub async fn register(
    State(state): State<AppState>,
    body: Bytes,
) -> AuthResult<impl IntoResponse> {
    let payload: RegisterRequest = parse_body(&body)?;

    let profile = state
        .manager
        .register(Registration {
            name: payload.name,
            email: payload.email,
            password: SecretString::from(payload.password),
            age: payload.age,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(profile)))
}

/// User login endpoint
pub async fn login(
    State(state): State<AppState>,
    body: Bytes,
) -> AuthResult<impl IntoResponse> {
    let payload: LoginRequest = parse_body(&body)?;
    info!("Login attempt");

    let pair = state
        .manager
        .login(
            &payload.email,
            &SecretString::from(payload.password),
            &payload.device_info,
        )
        .await?;

    Ok((StatusCode::OK, Json(TokenResponse::expose(pair))))
}

/// Refresh token endpoint
///
/// The token may come as `Authorization: Bearer <token>`, paired with a
/// `Device-Info` header, or in the body together with `device_info`.
pub async fn refresh_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AuthResult<impl IntoResponse> {
    info!("Token refresh request");

    let (token, device_info) = match bearer_token(&headers) {
        Ok(token) => {
            let device_info = headers
                .get(DEVICE_INFO_HEADER)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default()
                .to_string();
            (token, device_info)
        }
        Err(_) => {
            let payload: RefreshTokenRequest = parse_optional_body(&body)?;
            (payload.refresh_token, payload.device_info)
        }
    };

    if token.is_empty() {
        return Err(AuthError::Validation(
            "refresh token is required".to_string(),
        ));
    }

    let pair = state.manager.refresh(&token, &device_info).await?;

    Ok((StatusCode::OK, Json(TokenResponse::expose(pair))))
}

/// Logout endpoint
///
/// Accepts the refresh token as a bearer header or in the body.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AuthResult<impl IntoResponse> {
    let payload: LogoutRequest = parse_optional_body(&body)?;
    let token = bearer_token(&headers).unwrap_or(payload.refresh_token);

    if token.is_empty() {
        return Err(AuthError::Validation(
            "refresh token is required".to_string(),
        ));
    }

    state.manager.logout(&token, payload.logout_all).await?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({"message": "Logged out successfully"})),
    ))
}

/// Profile of the authenticated caller
pub async fn current_user(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
) -> AuthResult<impl IntoResponse> {
    let profile = state.manager.current_user(user_id).await?;
    Ok(Json(profile))
}

/// Like [`parse_body`], but an empty body yields the default request
fn parse_optional_body<T: Default + for<'de> Deserialize<'de>>(body: &[u8]) -> AuthResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    parse_body(body)
}

/// Decode a JSON body, reporting shape problems as validation errors
fn parse_body<T: for<'de> Deserialize<'de>>(body: &[u8]) -> AuthResult<T> {
    serde_json::from_slice(body).map_err(|e| {
        debug!("Rejected request body at line {} column {}", e.line(), e.column());
        AuthError::Validation(format!("Invalid request body: {}", e))
    })
}
