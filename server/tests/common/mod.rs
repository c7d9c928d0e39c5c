#![allow(dead_code)]

use std::collections::HashMap;
use std::time::Duration;

use fixtures::provider::{ProviderBehavior, RunningProvider};
use oidc_relay::{OidcConfig, OidcFlow};

pub const CLIENT_ID: &str = "oidc-relay";
pub const REDIRECT_URI: &str = "http://localhost:3000/callback?source=rust";

pub async fn spawn_provider(behavior: ProviderBehavior) -> RunningProvider {
    RunningProvider::spawn(behavior)
        .await
        .expect("Failed to start stub provider")
}

pub fn config_for(provider: &RunningProvider) -> OidcConfig {
    OidcConfig::new(provider.base_url(), CLIENT_ID, REDIRECT_URI)
        .with_request_timeout(Duration::from_secs(5))
}

pub async fn flow_for(provider: &RunningProvider) -> OidcFlow {
    OidcFlow::discover(config_for(provider))
        .await
        .expect("Failed to build flow")
}

pub fn query_params(url: &str) -> HashMap<String, String> {
    let (_, query) = url.split_once('?').expect("URL has no query string");
    serde_urlencoded::from_str(query).expect("Failed to parse query string")
}

/// Plays the browser: visits the authorization URL and returns `(code, state)` from the
/// redirect back to the relying party.
pub async fn authorize(auth_url: &str) -> (String, String) {
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    let response = client.get(auth_url).send().await.unwrap();
    assert!(
        response.status().is_redirection(),
        "authorize returned {}",
        response.status()
    );

    let location = response
        .headers()
        .get(reqwest::header::LOCATION)
        .expect("redirect without Location")
        .to_str()
        .unwrap()
        .to_string();
    assert!(location.starts_with("http://localhost:3000/callback?source=rust&"));

    let params = query_params(&location);
    (params["code"].clone(), params["state"].clone())
}
