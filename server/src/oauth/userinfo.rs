use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{read_success_body, UpstreamError};
use super::utils::null_as_empty;

/// Profile claims returned by the userinfo endpoint.
///
/// A claim the provider leaves out (e.g. `email` when that scope was not granted) is kept
/// as an empty string rather than dropping the whole profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub sub: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Fetch the user's profile with the freshly issued access token
///
/// A body that is not a JSON object is a decode error.
pub async fn fetch_user_info(
    client: &reqwest::Client,
    userinfo_endpoint: &str,
    access_token: &str,
) -> Result<UserInfo, UpstreamError> {
    debug!("Userinfo endpoint: {}", userinfo_endpoint);

    let response = client
        .get(userinfo_endpoint)
        .header("Accept", "application/json")
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|e| UpstreamError::transport(userinfo_endpoint, e))?;

    let body = read_success_body(userinfo_endpoint, response).await?;

    serde_json::from_str(&body).map_err(|e| UpstreamError::decode(userinfo_endpoint, e))
}
