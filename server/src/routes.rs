use axum::{
    http::HeaderValue,
    routing::{get, post},
    Json,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::state::AppState;

pub mod auth;

/// Build the application router with all routes
pub fn routes(app_state: AppState) -> axum::Router {
    let cors = cors_layer(&app_state);

    axum::Router::new()
        // Liveness
        .route("/status", get(status))
        .route("/health", get(health))
        // OIDC flow
        .route("/auth/start", post(auth::start))
        .route("/auth/callback", post(auth::callback))
        .route("/sessions/:state", get(auth::session))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(app_state)
}

fn cors_layer(app_state: &AppState) -> CorsLayer {
    let origins: Vec<HeaderValue> = app_state
        .allowed_origins()
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn status() -> &'static str {
    "up"
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
