use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::OidcConfig;
use crate::oauth::error::{read_success_body, UpstreamError};
use crate::oauth::utils::null_as_empty;

/// Lifetime assumed when the provider does not report one
pub const DEFAULT_EXPIRES_IN: u64 = 3600;

/// Form body for the authorization-code grant
#[derive(Serialize)]
struct TokenRequestForm<'a> {
    grant_type: &'static str,
    code: &'a str,
    redirect_uri: &'a str,
    client_id: &'a str,
    code_verifier: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_secret: Option<&'a str>,
}

/// Token endpoint response as the provider sent it
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub access_token: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub id_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Tokens with the defaults filled in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthTokenSet {
    /// Opaque bearer token
    pub access_token: String,
    /// Stored as received; the signature is not checked
    pub id_token: String,
    /// Seconds
    pub expires_in: u64,
    /// Space-delimited scopes granted
    pub scope: String,
}

impl TokenResponse {
    /// A missing or zero `expires_in` becomes [`DEFAULT_EXPIRES_IN`], a missing or empty
    /// `scope` becomes the scope that was requested.
    pub fn into_token_set(self, requested_scope: &str) -> OAuthTokenSet {
        OAuthTokenSet {
            access_token: self.access_token,
            id_token: self.id_token,
            expires_in: self
                .expires_in
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_EXPIRES_IN),
            scope: self
                .scope
                .filter(|scope| !scope.trim().is_empty())
                .unwrap_or_else(|| requested_scope.to_string()),
        }
    }
}

/// Exchange authorization code for access token
///
/// Not retried: any transport error or status >= 400 is returned to the caller.
pub async fn exchange_code_for_token(
    client: &reqwest::Client,
    token_endpoint: &str,
    config: &OidcConfig,
    code: &str,
    code_verifier: &str,
) -> Result<OAuthTokenSet, UpstreamError> {
    debug!("Token endpoint: {}", token_endpoint);
    debug!("Client ID: {}", config.client_id);
    debug!("Redirect URI: {}", config.redirect_uri);
    debug!("Client secret present: {}", config.client_secret.is_some());

    let form = TokenRequestForm {
        grant_type: "authorization_code",
        code,
        redirect_uri: &config.redirect_uri,
        client_id: &config.client_id,
        code_verifier,
        client_secret: config.client_secret.as_deref(),
    };

    let response = client
        .post(token_endpoint)
        .header("Accept", "application/json")
        .form(&form)
        .send()
        .await
        .map_err(|e| UpstreamError::transport(token_endpoint, e))?;

    let body = match read_success_body(token_endpoint, response).await {
        Ok(body) => body,
        Err(err) => {
            if let UpstreamError::Status { status, body, .. } = &err {
                error!(
                    "Token request failed. Status: {}, Error: {}\nRequest URL: {}",
                    status, body, token_endpoint
                );
            }
            return Err(err);
        }
    };

    let response: TokenResponse =
        serde_json::from_str(&body).map_err(|e| UpstreamError::decode(token_endpoint, e))?;

    Ok(response.into_token_set(&config.scope))
}
