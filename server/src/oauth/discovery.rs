//! Provider metadata resolution.
//!
//! The discovery document is fetched once, when the flow is built. Any failure leaves
//! every endpoint empty, and each consumer then falls back to `{provider}/oidc/{name}`.

use serde::{Deserialize, Deserializer};
use tracing::{debug, info, warn};

use super::error::{read_success_body, UpstreamError};
use crate::config::OidcConfig;

/// The subset of the discovery document this relay uses
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProviderMetadata {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub authorization_endpoint: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub token_endpoint: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub userinfo_endpoint: Option<String>,
}

impl ProviderMetadata {
    pub fn authorization_url(&self, config: &OidcConfig) -> String {
        self.authorization_endpoint
            .clone()
            .unwrap_or_else(|| config.default_endpoint("authorize"))
    }

    pub fn token_url(&self, config: &OidcConfig) -> String {
        self.token_endpoint
            .clone()
            .unwrap_or_else(|| config.default_endpoint("token"))
    }

    pub fn userinfo_url(&self, config: &OidcConfig) -> String {
        self.userinfo_endpoint
            .clone()
            .unwrap_or_else(|| config.default_endpoint("userinfo"))
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|endpoint| !endpoint.trim().is_empty()))
}

/// Best-effort discovery. Never fails; an unreachable or broken provider yields empty metadata.
pub async fn resolve(client: &reqwest::Client, config: &OidcConfig) -> ProviderMetadata {
    let discovery_url = config.discovery_url();

    match fetch(client, &discovery_url).await {
        Ok(metadata) => {
            info!(
                discovery_url = %discovery_url,
                authorization_endpoint = ?metadata.authorization_endpoint,
                token_endpoint = ?metadata.token_endpoint,
                userinfo_endpoint = ?metadata.userinfo_endpoint,
                "Loaded provider metadata"
            );
            metadata
        }
        Err(err) => {
            warn!(
                discovery_url = %discovery_url,
                error = %err,
                "Provider discovery failed, falling back to default endpoints"
            );
            ProviderMetadata::default()
        }
    }
}

async fn fetch(
    client: &reqwest::Client,
    discovery_url: &str,
) -> Result<ProviderMetadata, UpstreamError> {
    debug!("Fetching discovery document from {}", discovery_url);

    let response = client
        .get(discovery_url)
        .header("Accept", "application/json")
        .send()
        .await
        .map_err(|e| UpstreamError::transport(discovery_url, e))?;

    let body = read_success_body(discovery_url, response).await?;

    serde_json::from_str(&body).map_err(|e| UpstreamError::decode(discovery_url, e))
}
