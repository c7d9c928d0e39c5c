use reqwest::StatusCode;

/// Failure talking to the OpenID Provider
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("request to {endpoint} failed")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned {status}")]
    Status {
        endpoint: String,
        status: StatusCode,
        body: String,
    },

    #[error("failed to decode response from {endpoint}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
}

impl UpstreamError {
    pub(crate) fn transport(endpoint: &str, source: reqwest::Error) -> Self {
        Self::Transport {
            endpoint: endpoint.to_string(),
            source,
        }
    }

    pub(crate) fn decode(endpoint: &str, source: serde_json::Error) -> Self {
        Self::Decode {
            endpoint: endpoint.to_string(),
            source,
        }
    }

    /// HTTP status reported by the provider, if it answered at all
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport { source, .. } => source.status(),
            Self::Decode { .. } => None,
        }
    }
}

/// Reads the body of a response, turning any HTTP status >= 400 into [`UpstreamError::Status`]
pub(crate) async fn read_success_body(
    endpoint: &str,
    response: reqwest::Response,
) -> Result<String, UpstreamError> {
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error response".to_string());
        return Err(UpstreamError::Status {
            endpoint: endpoint.to_string(),
            status,
            body,
        });
    }

    response
        .text()
        .await
        .map_err(|e| UpstreamError::transport(endpoint, e))
}
