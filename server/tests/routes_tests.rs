mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use fixtures::provider::ProviderBehavior;
use oidc_relay::{oauth::ProviderMetadata, routes, AppState, OidcConfig, OidcFlow, ServerConfig};
use serde_json::{json, Value};
use tower::ServiceExt as _;

use common::{authorize, flow_for, spawn_provider};

fn offline_app() -> Router {
    let config = OidcConfig::new("http://op.test", common::CLIENT_ID, common::REDIRECT_URI);
    let flow = OidcFlow::new(config, ProviderMetadata::default(), reqwest::Client::new());
    routes::routes(AppState::new(flow, ServerConfig::default()))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_status_and_health() {
    let app = offline_app();

    let response = app.clone().oneshot(get("/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"up");

    let (status, json) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_start_returns_auth_url_and_state() {
    let app = offline_app();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/auth/start")
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    let auth_url = json["auth_url"].as_str().unwrap();
    let state = json["state"].as_str().unwrap();
    assert!(auth_url.starts_with("http://op.test/oidc/authorize?"));
    assert_eq!(common::query_params(auth_url)["state"], state);
}

#[tokio::test]
async fn test_unknown_state_is_404_with_detail() {
    let app = offline_app();

    let (status, json) = send(&app, get("/sessions/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json, json!({"detail": "state not found"}));

    let (status, json) = send(
        &app,
        post_json("/auth/callback", json!({"state": "nope", "code": "ABC"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json, json!({"detail": "state not found"}));
}

#[tokio::test]
async fn test_callback_requires_state_and_code() {
    let app = offline_app();

    let (status, _) = send(&app, post_json("/auth/callback", json!({"state": "s"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(&app, post_json("/auth/callback", json!({"code": "c"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_cors_preflight_allows_frontend_origin() {
    let app = offline_app();

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/auth/start")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "http://localhost:3000"
    );
}

#[tokio::test]
async fn test_login_over_http() {
    let provider = spawn_provider(ProviderBehavior::default()).await;
    let flow = flow_for(&provider).await;
    let app = routes::routes(AppState::new(flow, ServerConfig::default()));

    let start = Request::builder()
        .method(Method::POST)
        .uri("/auth/start")
        .body(Body::empty())
        .unwrap();
    let (_, started) = send(&app, start).await;
    let state = started["state"].as_str().unwrap().to_string();

    let (code, _) = authorize(started["auth_url"].as_str().unwrap()).await;

    let expected = json!({
        "access_token": "AT1",
        "id_token": "IT1",
        "expires_in": 120,
        "scope": "openid",
        "user": {"sub": "u1", "email": "a@b.com"}
    });

    let (status, session) = send(
        &app,
        post_json("/auth/callback", json!({"state": state, "code": code})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session, expected);

    let (status, session) = send(&app, get(&format!("/sessions/{state}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session, expected);

    let (status, _) = send(
        &app,
        post_json("/auth/callback", json!({"state": state, "code": code})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_token_failure_is_bad_gateway() {
    let provider = spawn_provider(ProviderBehavior {
        token_status: Some(400),
        ..Default::default()
    })
    .await;
    let flow = flow_for(&provider).await;
    let app = routes::routes(AppState::new(flow, ServerConfig::default()));

    let start = Request::builder()
        .method(Method::POST)
        .uri("/auth/start")
        .body(Body::empty())
        .unwrap();
    let (_, started) = send(&app, start).await;
    let (code, state) = authorize(started["auth_url"].as_str().unwrap()).await;

    let (status, json) = send(
        &app,
        post_json("/auth/callback", json!({"state": state, "code": code})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json, json!({"detail": "token exchange failed"}));
}
