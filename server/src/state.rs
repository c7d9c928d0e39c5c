use std::sync::Arc;

use crate::config::{OidcConfig, ServerConfig};
use crate::flow::OidcFlow;

#[derive(Clone)]
pub struct AppState {
    pub flow: Arc<OidcFlow>,
    pub server: ServerConfig,
}

impl AppState {
    /// Reads configuration and performs the one-time provider discovery
    pub async fn from_env() -> color_eyre::Result<Self> {
        let server = ServerConfig::from_env()?;
        let oidc = OidcConfig::from_env()?;

        tracing::info!(
            provider_url = %oidc.provider_url,
            client_id = %oidc.client_id,
            redirect_uri = %oidc.redirect_uri,
            "Loaded OIDC configuration"
        );

        let flow = OidcFlow::discover(oidc).await?;

        Ok(Self::new(flow, server))
    }

    pub fn new(flow: OidcFlow, server: ServerConfig) -> Self {
        Self {
            flow: Arc::new(flow),
            server,
        }
    }

    /// Origins allowed to call the API from a browser
    pub fn allowed_origins(&self) -> Vec<String> {
        let mut origins = vec![self.server.frontend_origin.clone()];
        for local in ["http://localhost:3000", "http://127.0.0.1:3000"] {
            if !origins.iter().any(|origin| origin == local) {
                origins.push(local.to_string());
            }
        }
        origins
    }
}
