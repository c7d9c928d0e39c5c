use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use tracing::info;

use crate::{
    errors::ServerResult,
    flow::StartResponse,
    oauth::Session,
    state::AppState,
};

/// Body posted by the frontend after the provider redirected back to it
#[derive(Deserialize)]
pub struct CallbackPayload {
    pub state: String,
    pub code: String,
}

/// Start the OIDC login flow
pub async fn start(State(state): State<AppState>) -> ServerResult<Json<StartResponse>> {
    let started = state.flow.start().await?;
    Ok(Json(started))
}

/// Exchange the authorization code and store the session
pub async fn callback(
    State(state): State<AppState>,
    Json(payload): Json<CallbackPayload>,
) -> ServerResult<Json<Session>> {
    info!("Callback received for state: {}", payload.state);

    let session = state.flow.complete(&payload.state, &payload.code).await?;
    Ok(Json(session))
}

/// Retrieve a previously completed session by state
pub async fn session(
    State(state): State<AppState>,
    Path(login_state): Path<String>,
) -> ServerResult<Json<Session>> {
    let session = state.flow.session(&login_state).await?;
    Ok(Json(session))
}
