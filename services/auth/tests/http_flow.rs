//! End-to-end tests of the HTTP surface
//!
//! The router runs against the in-memory store, so no database is needed.

use std::sync::Arc;

use auth::{
    AppState,
    config::AuthConfig,
    repositories::{InMemorySessionStore, SessionStore},
    routes::create_router,
    session::SessionManager,
};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;

fn app() -> (Router, InMemorySessionStore) {
    let store = InMemorySessionStore::new();
    let config = AuthConfig::new(SecretString::from("http-flow-secret".to_string()));
    let manager = SessionManager::new(Arc::new(store.clone()), &config);
    (create_router(AppState::new(manager)), store)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn register(app: &Router, email: &str) -> (StatusCode, Value) {
    send(
        app,
        post_json(
            "/auth/register",
            json!({"name": "Ada", "email": email, "password": "secret1", "age": 30}),
        ),
    )
    .await
}

async fn login(app: &Router, email: &str, password: &str) -> (StatusCode, Value) {
    send(
        app,
        post_json(
            "/auth/login",
            json!({"email": email, "password": password, "device_info": "laptop"}),
        ),
    )
    .await
}

fn field(body: &Value, name: &str) -> String {
    body[name].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health() {
    let (app, _) = app();
    let (status, body) = send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_register_returns_profile_without_credentials() {
    let (app, _) = app();
    let (status, body) = register(&app, "ada@example.com").await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["email"], "ada@example.com");
    assert_eq!(body["age"], 30);
    assert!(body.get("password").is_none());
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn test_register_conflict_and_validation() {
    let (app, _) = app();
    register(&app, "ada@example.com").await;

    let (status, body) = register(&app, "ada@example.com").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "email already registered");

    let (status, body) = send(
        &app,
        post_json(
            "/auth/register",
            json!({"name": "Kid", "email": "kid@example.com", "password": "secret1", "age": 12}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Age must be at least 13");

    let (status, _) = send(
        &app,
        Request::post("/auth/register")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_success_and_uniform_failures() {
    let (app, _) = app();
    register(&app, "ada@example.com").await;

    let (status, body) = login(&app, "ada@example.com", "secret1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 3600);
    assert!(!field(&body, "access_token").is_empty());
    assert!(!field(&body, "refresh_token").is_empty());

    let wrong_password = login(&app, "ada@example.com", "wrong-password").await;
    let unknown_email = login(&app, "nobody@example.com", "secret1").await;
    assert_eq!(wrong_password.0, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password, unknown_email);

    let (status, _) = login(&app, "", "secret1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_refresh_rotates_and_rejects_replay() {
    let (app, store) = app();
    register(&app, "ada@example.com").await;
    let (_, tokens) = login(&app, "ada@example.com", "secret1").await;
    let original = field(&tokens, "refresh_token");

    let (status, rotated) = send(
        &app,
        post_json("/auth/refresh", json!({"refresh_token": original})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let second = field(&rotated, "refresh_token");
    assert_ne!(second, original);

    // Header form, with the device descriptor taken from Device-Info
    let (status, rotated) = send(
        &app,
        Request::post("/auth/refresh")
            .header(header::AUTHORIZATION, format!("Bearer {second}"))
            .header("Device-Info", "phone")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let third = field(&rotated, "refresh_token");

    let current = store.get_refresh_session(&third).await.unwrap().unwrap();
    assert_eq!(current.device_info, "phone");
    assert_eq!(store.sessions_for_user(current.user_id).await.len(), 3);

    let (status, body) = send(
        &app,
        post_json("/auth/refresh", json!({"refresh_token": original})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "token expired");

    let (status, body) = send(
        &app,
        post_json("/auth/refresh", json!({"refresh_token": "never-issued"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid token");

    let (status, _) = send(
        &app,
        Request::post("/auth/refresh").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_logout_single_and_all() {
    let (app, _) = app();
    register(&app, "ada@example.com").await;
    let (_, first) = login(&app, "ada@example.com", "secret1").await;
    let (_, second) = login(&app, "ada@example.com", "secret1").await;
    let (_, third) = login(&app, "ada@example.com", "secret1").await;

    let (status, _) = send(
        &app,
        post_json(
            "/auth/logout",
            json!({"refresh_token": field(&first, "refresh_token")}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        post_json(
            "/auth/refresh",
            json!({"refresh_token": field(&first, "refresh_token")}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        post_json(
            "/auth/logout",
            json!({"refresh_token": field(&second, "refresh_token"), "logout_all": true}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        post_json(
            "/auth/refresh",
            json!({"refresh_token": field(&third, "refresh_token")}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        post_json("/auth/logout", json!({"refresh_token": "never-issued"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_current_user_requires_valid_access_token() {
    let (app, _) = app();
    let (_, profile) = register(&app, "ada@example.com").await;
    let (_, tokens) = login(&app, "ada@example.com", "secret1").await;

    let (status, body) = send(
        &app,
        Request::get("/users/me")
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", field(&tokens, "access_token")),
            )
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], profile["id"]);

    for authorization in [None, Some("Bearer garbage"), Some("Basic dXNlcjpwYXNz")] {
        let mut request = Request::get("/users/me");
        if let Some(value) = authorization {
            request = request.header(header::AUTHORIZATION, value);
        }
        let (status, body) = send(&app, request.body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{authorization:?}");
        assert_eq!(body["error"], "unauthorized");
    }

    // A refresh token is not an access token
    let (status, _) = send(
        &app,
        Request::get("/users/me")
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", field(&tokens, "refresh_token")),
            )
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_device_info_follows_token_source() {
    let (app, store) = app();
    register(&app, "ada@example.com").await;
    let (_, tokens) = login(&app, "ada@example.com", "secret1").await;

    // Body token: the descriptor comes from the body, the header is ignored
    let (status, rotated) = send(
        &app,
        Request::post("/auth/refresh")
            .header(header::CONTENT_TYPE, "application/json")
            .header("Device-Info", "header-device")
            .body(Body::from(
                json!({
                    "refresh_token": field(&tokens, "refresh_token"),
                    "device_info": "body-device",
                })
                .to_string(),
            ))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let second = field(&rotated, "refresh_token");
    let session = store.get_refresh_session(&second).await.unwrap().unwrap();
    assert_eq!(session.device_info, "body-device");

    // Header token: the descriptor comes from the header, the body is ignored
    let (status, rotated) = send(
        &app,
        Request::post("/auth/refresh")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {second}"))
            .header("Device-Info", "header-device")
            .body(Body::from(json!({"device_info": "body-device"}).to_string()))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let third = field(&rotated, "refresh_token");
    let session = store.get_refresh_session(&third).await.unwrap().unwrap();
    assert_eq!(session.device_info, "header-device");
}

#[tokio::test]
async fn test_logout_accepts_bearer_header() {
    let (app, store) = app();
    register(&app, "ada@example.com").await;
    let (_, tokens) = login(&app, "ada@example.com", "secret1").await;
    let refresh_token = field(&tokens, "refresh_token");

    let (status, _) = send(
        &app,
        Request::post("/auth/logout")
            .header(header::AUTHORIZATION, format!("Bearer {refresh_token}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let session = store
        .get_refresh_session(&refresh_token)
        .await
        .unwrap()
        .unwrap();
    assert!(session.revoked);

    let (status, _) = send(
        &app,
        Request::post("/auth/logout").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
