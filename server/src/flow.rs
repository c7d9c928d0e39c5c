//! The Authorization Code + PKCE login flow.
//!
//! A flow moves from `STARTED` (verifier held in the login store) to `COMPLETED`
//! (session held in the session store), keyed by the same state token throughout.

use color_eyre::eyre::WrapErr;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::OidcConfig;
use crate::oauth::{
    self, discovery, pkce, token, userinfo, FlowStore, PendingLogin, ProviderMetadata, Session,
    UpstreamError,
};

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    /// The state is unknown, already consumed, or expired
    #[error("state not found")]
    NotFound,

    #[error("upstream provider error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("failed to generate PKCE material")]
    Generation(#[from] rand::Error),
}

/// Returned by [`OidcFlow::start`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartResponse {
    /// Where the browser should be sent
    pub auth_url: String,
    pub state: String,
}

#[derive(Serialize)]
struct AuthUrlParams<'a> {
    client_id: &'a str,
    redirect_uri: &'a str,
    response_type: &'static str,
    scope: &'a str,
    state: &'a str,
    code_challenge: &'a str,
    code_challenge_method: &'static str,
}

pub struct OidcFlow {
    config: OidcConfig,
    metadata: ProviderMetadata,
    http: reqwest::Client,
    store: FlowStore,
}

impl OidcFlow {
    /// Builds the HTTP client and resolves provider metadata once.
    ///
    /// Discovery failures do not fail construction; only an unusable HTTP client does.
    pub async fn discover(config: OidcConfig) -> color_eyre::Result<Self> {
        let http = reqwest::ClientBuilder::new()
            .timeout(config.request_timeout)
            .use_rustls_tls()
            .build()
            .wrap_err("Failed to build HTTP client")?;

        let metadata = discovery::resolve(&http, &config).await;

        Ok(Self::new(config, metadata, http))
    }

    pub fn new(config: OidcConfig, metadata: ProviderMetadata, http: reqwest::Client) -> Self {
        Self {
            config,
            metadata,
            http,
            store: FlowStore::new(),
        }
    }

    pub fn config(&self) -> &OidcConfig {
        &self.config
    }

    pub fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    pub async fn pending_count(&self) -> usize {
        self.store.pending_len().await
    }

    pub async fn session_count(&self) -> usize {
        self.store.session_len().await
    }

    /// Mint a state, generate PKCE material, and remember the verifier under that state
    #[instrument(skip(self), err)]
    pub async fn start(&self) -> Result<StartResponse, FlowError> {
        let state = Uuid::new_v4().to_string();
        let pkce = pkce::generate()?;

        let auth_url = self.authorization_url(&state, &pkce.challenge);

        let pruned = self
            .store
            .put_pending(
                state.clone(),
                PendingLogin::new(pkce.verifier),
                self.config.pending_login_ttl,
            )
            .await;
        if pruned > 0 {
            info!(pruned, "Dropped expired pending logins");
        }

        info!(state = %state, "Started login");
        Ok(StartResponse { auth_url, state })
    }

    /// Redeem `code` for the login started under `state` and store the resulting session.
    ///
    /// The pending login is consumed before the provider is contacted, so a failed exchange
    /// means the flow has to be restarted.
    #[instrument(skip(self, code), err)]
    pub async fn complete(&self, state: &str, code: &str) -> Result<Session, FlowError> {
        let pending = self
            .store
            .take_pending(state)
            .await
            .ok_or(FlowError::NotFound)?;

        if let Some(ttl) = self.config.pending_login_ttl {
            if pending.is_expired(ttl) {
                info!(state = %state, "Pending login expired");
                return Err(FlowError::NotFound);
            }
        }

        let tokens = token::exchange_code_for_token(
            &self.http,
            &self.metadata.token_url(&self.config),
            &self.config,
            code,
            &pending.code_verifier,
        )
        .await?;

        let user = self.fetch_user_info(&tokens.access_token).await;
        let session = Session::from_token_set(tokens, user);

        self.store
            .put_session(state.to_string(), session.clone())
            .await;

        info!(
            state = %state,
            has_user = session.user.is_some(),
            "Completed login"
        );
        Ok(session)
    }

    /// Look up a completed session. Read-only and repeatable.
    pub async fn session(&self, state: &str) -> Result<Session, FlowError> {
        self.store
            .get_session(state)
            .await
            .ok_or(FlowError::NotFound)
    }

    fn authorization_url(&self, state: &str, code_challenge: &str) -> String {
        let params = AuthUrlParams {
            client_id: &self.config.client_id,
            redirect_uri: &self.config.redirect_uri,
            response_type: "code",
            scope: &self.config.scope,
            state,
            code_challenge,
            code_challenge_method: pkce::CHALLENGE_METHOD,
        };

        // Serializing a flat struct of strings cannot fail
        let query = serde_urlencoded::to_string(&params).unwrap_or_default();

        oauth::utils::append_query(&self.metadata.authorization_url(&self.config), &query)
    }

    /// Enrichment only: every failure is logged and swallowed
    async fn fetch_user_info(&self, access_token: &str) -> Option<userinfo::UserInfo> {
        let endpoint = self.metadata.userinfo_url(&self.config);

        match userinfo::fetch_user_info(&self.http, &endpoint, access_token).await {
            Ok(info) => Some(info),
            Err(err) => {
                warn!(error = %err, "Skipping userinfo enrichment");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn flow(metadata: ProviderMetadata) -> OidcFlow {
        let config = OidcConfig::new(
            "http://op.test",
            "relay-client",
            "http://localhost:3000/callback?source=rust",
        )
        .with_scope("openid email");
        OidcFlow::new(config, metadata, reqwest::Client::new())
    }

    fn query_of(url: &str) -> HashMap<String, String> {
        let (_, query) = url.split_once('?').unwrap();
        serde_urlencoded::from_str(query).unwrap()
    }

    #[tokio::test]
    async fn test_start_builds_authorization_url() {
        let flow = flow(ProviderMetadata::default());

        let started = flow.start().await.unwrap();

        assert!(started.auth_url.starts_with("http://op.test/oidc/authorize?"));
        let params = query_of(&started.auth_url);
        assert_eq!(params["client_id"], "relay-client");
        assert_eq!(
            params["redirect_uri"],
            "http://localhost:3000/callback?source=rust"
        );
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["scope"], "openid email");
        assert_eq!(params["state"], started.state);
        assert_eq!(params["code_challenge_method"], "S256");
        assert_eq!(params["code_challenge"].len(), 43);
        assert_eq!(flow.pending_count().await, 1);
    }

    #[tokio::test]
    async fn test_challenge_is_derived_from_stored_verifier() {
        let flow = flow(ProviderMetadata::default());

        let started = flow.start().await.unwrap();
        let params = query_of(&started.auth_url);
        let pending = flow.store.take_pending(&started.state).await.unwrap();

        assert_eq!(
            params["code_challenge"],
            pkce::challenge_for(&pending.code_verifier)
        );
    }

    #[tokio::test]
    async fn test_start_uses_discovered_authorization_endpoint() {
        let flow = flow(ProviderMetadata {
            authorization_endpoint: Some("http://op.test/connect/authorize".to_string()),
            ..Default::default()
        });

        let started = flow.start().await.unwrap();

        assert!(started
            .auth_url
            .starts_with("http://op.test/connect/authorize?"));
    }

    #[tokio::test]
    async fn test_states_are_unique() {
        let flow = flow(ProviderMetadata::default());

        let mut states = std::collections::HashSet::new();
        for _ in 0..200 {
            assert!(states.insert(flow.start().await.unwrap().state));
        }
        assert_eq!(flow.pending_count().await, 200);
    }

    #[tokio::test]
    async fn test_complete_with_unknown_state_is_not_found() {
        let flow = flow(ProviderMetadata::default());

        let result = flow.complete("never-issued", "ABC").await;

        assert!(matches!(result, Err(FlowError::NotFound)));
    }

    #[tokio::test]
    async fn test_session_before_complete_is_not_found() {
        let flow = flow(ProviderMetadata::default());
        let started = flow.start().await.unwrap();

        assert!(matches!(
            flow.session(&started.state).await,
            Err(FlowError::NotFound)
        ));
    }
}
