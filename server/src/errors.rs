use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::flow::FlowError;

#[derive(Debug)]
pub struct ServerError<R: IntoResponse>(pub(crate) color_eyre::Report, pub(crate) R);

pub type ServerResult<S, F = ErrorDetail> = Result<S, ServerError<F>>;

impl<R: IntoResponse> IntoResponse for ServerError<R> {
    fn into_response(self) -> axum::response::Response {
        let response = self.1.into_response();

        if response.status().is_server_error() {
            tracing::error!(error = ?self.0, status = %response.status(), "Request Error");
        } else {
            tracing::info!(error = %self.0, status = %response.status(), "Request rejected");
        }

        response
    }
}

/// JSON error body: `{"detail": "..."}`
#[derive(Debug)]
pub struct ErrorDetail {
    pub status: StatusCode,
    pub detail: String,
}

impl IntoResponse for ErrorDetail {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "detail": self.detail })),
        )
            .into_response()
    }
}

impl FlowError {
    pub fn status(&self) -> StatusCode {
        match self {
            FlowError::NotFound => StatusCode::NOT_FOUND,
            FlowError::Upstream(_) => StatusCode::BAD_GATEWAY,
            FlowError::Generation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> &'static str {
        match self {
            FlowError::NotFound => "state not found",
            FlowError::Upstream(_) => "token exchange failed",
            FlowError::Generation(_) => "failed to start login",
        }
    }
}

impl From<FlowError> for ServerError<ErrorDetail> {
    fn from(err: FlowError) -> Self {
        let detail = ErrorDetail {
            status: err.status(),
            detail: err.detail().to_string(),
        };
        ServerError(color_eyre::Report::new(err), detail)
    }
}
