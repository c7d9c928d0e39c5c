//! A stub OpenID Provider.
//!
//! The authorization endpoint auto-approves and redirects straight back with a code, so a
//! test can play the browser with a plain HTTP client. The token endpoint really checks
//! the S256 PKCE binding between the code and the verifier.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Form, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

/// What the provider returns, and which endpoints misbehave
#[derive(Debug, Clone)]
pub struct ProviderBehavior {
    /// Serve `/.well-known/openid-configuration`; otherwise 404
    pub discovery: bool,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub access_token: String,
    pub id_token: String,
    /// Left out of the token response when `None`
    pub expires_in: Option<u64>,
    /// Left out of the token response when `None`
    pub scope: Option<String>,
    /// Force the token endpoint to answer with this status
    pub token_status: Option<u16>,
    /// Force the userinfo endpoint to answer with this status
    pub userinfo_status: Option<u16>,
    pub user: serde_json::Value,
}

impl Default for ProviderBehavior {
    fn default() -> Self {
        Self {
            discovery: true,
            client_id: "oidc-relay".to_string(),
            client_secret: None,
            access_token: "AT1".to_string(),
            id_token: "IT1".to_string(),
            expires_in: Some(120),
            scope: Some("openid".to_string()),
            token_status: None,
            userinfo_status: None,
            user: json!({ "sub": "u1", "email": "a@b.com" }),
        }
    }
}

#[derive(Debug, Clone)]
struct IssuedCode {
    client_id: String,
    redirect_uri: String,
    code_challenge: String,
}

pub struct StubProvider {
    base_url: String,
    behavior: ProviderBehavior,
    codes: Mutex<HashMap<String, IssuedCode>>,
    token_requests: Mutex<Vec<HashMap<String, String>>>,
    userinfo_calls: Mutex<usize>,
}

impl StubProvider {
    pub fn new(base_url: impl Into<String>, behavior: ProviderBehavior) -> Arc<Self> {
        Arc::new(Self {
            base_url: base_url.into(),
            behavior,
            codes: Mutex::new(HashMap::new()),
            token_requests: Mutex::new(Vec::new()),
            userinfo_calls: Mutex::new(0),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn behavior(&self) -> &ProviderBehavior {
        &self.behavior
    }

    /// Every form body posted to the token endpoint, in order
    pub fn token_requests(&self) -> Vec<HashMap<String, String>> {
        self.token_requests.lock().unwrap().clone()
    }

    pub fn userinfo_calls(&self) -> usize {
        *self.userinfo_calls.lock().unwrap()
    }
}

pub fn router(provider: Arc<StubProvider>) -> Router {
    Router::new()
        .route("/.well-known/openid-configuration", get(discovery))
        // Paths advertised by discovery
        .route("/connect/authorize", get(authorize))
        .route("/connect/token", post(token))
        .route("/connect/userinfo", get(userinfo))
        // Paths a client derives when discovery is unavailable
        .route("/oidc/authorize", get(authorize))
        .route("/oidc/token", post(token))
        .route("/oidc/userinfo", get(userinfo))
        .with_state(provider)
}

/// A stub provider served on an ephemeral local port. Stops when dropped.
pub struct RunningProvider {
    provider: Arc<StubProvider>,
    handle: JoinHandle<()>,
}

impl RunningProvider {
    pub async fn spawn(behavior: ProviderBehavior) -> anyhow::Result<Self> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let provider = StubProvider::new(format!("http://{addr}"), behavior);
        let app = router(provider.clone());

        let handle = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app).await {
                error!("Stub provider stopped: {:?}", err);
            }
        });

        Ok(Self { provider, handle })
    }

    pub fn base_url(&self) -> &str {
        self.provider.base_url()
    }

    pub fn provider(&self) -> &Arc<StubProvider> {
        &self.provider
    }
}

impl Drop for RunningProvider {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn oauth_error(status: StatusCode, error: &str, description: &str) -> Response {
    (
        status,
        Json(json!({
            "error": error,
            "error_description": description
        })),
    )
        .into_response()
}

fn s256(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

async fn discovery(State(provider): State<Arc<StubProvider>>) -> Response {
    if !provider.behavior.discovery {
        return StatusCode::NOT_FOUND.into_response();
    }

    let base_url = &provider.base_url;
    info!("OP: Returning openid-configuration");

    Json(json!({
        "issuer": base_url,
        "authorization_endpoint": format!("{base_url}/connect/authorize"),
        "token_endpoint": format!("{base_url}/connect/token"),
        "userinfo_endpoint": format!("{base_url}/connect/userinfo"),
        "jwks_uri": format!("{base_url}/.well-known/jwks.json"),
        "response_types_supported": ["code"],
        "subject_types_supported": ["public"],
        "id_token_signing_alg_values_supported": ["RS256"],
        "code_challenge_methods_supported": ["S256"],
        "grant_types_supported": ["authorization_code"],
        "token_endpoint_auth_methods_supported": ["client_secret_post", "none"]
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
struct AuthorizeQuery {
    client_id: Option<String>,
    redirect_uri: Option<String>,
    response_type: Option<String>,
    state: Option<String>,
    code_challenge: Option<String>,
    code_challenge_method: Option<String>,
}

#[derive(Serialize)]
struct OAuthRedirectParams<'a> {
    code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'a str>,
}

// The authorization endpoint is what the browser gets redirected to.
// For testing, we auto-authorize and redirect to the callback.
async fn authorize(
    State(provider): State<Arc<StubProvider>>,
    Query(params): Query<AuthorizeQuery>,
) -> Response {
    let (Some(client_id), Some(redirect_uri), Some(code_challenge)) = (
        params.client_id,
        params.redirect_uri,
        params.code_challenge,
    ) else {
        return oauth_error(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            "client_id, redirect_uri and code_challenge are required",
        );
    };

    if params.response_type.as_deref() != Some("code") {
        return oauth_error(
            StatusCode::BAD_REQUEST,
            "unsupported_response_type",
            "Only the code response type is supported",
        );
    }

    if params.code_challenge_method.as_deref() != Some("S256") {
        return oauth_error(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            "code_challenge_method must be S256",
        );
    }

    if client_id != provider.behavior.client_id {
        return oauth_error(
            StatusCode::BAD_REQUEST,
            "unauthorized_client",
            "Unknown client",
        );
    }

    let code = Uuid::new_v4().simple().to_string();
    provider.codes.lock().unwrap().insert(
        code.clone(),
        IssuedCode {
            client_id,
            redirect_uri: redirect_uri.clone(),
            code_challenge,
        },
    );

    let query = serde_urlencoded::to_string(OAuthRedirectParams {
        code: &code,
        state: params.state.as_deref(),
    })
    .unwrap_or_default();
    let separator = if redirect_uri.contains('?') { '&' } else { '?' };

    info!("OP: Issued authorization code, redirecting to {}", redirect_uri);
    Redirect::to(&format!("{redirect_uri}{separator}{query}")).into_response()
}

// Codes are only burned on a successful redemption, so a test can retry the same
// code with the right verifier after a PKCE mismatch.
async fn token(
    State(provider): State<Arc<StubProvider>>,
    Form(params): Form<HashMap<String, String>>,
) -> Response {
    info!("OP: Handling token request");
    provider.token_requests.lock().unwrap().push(params.clone());

    let behavior = &provider.behavior;

    if let Some(status) = behavior.token_status {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return oauth_error(status, "server_error", "Token endpoint configured to fail");
    }

    let param = |name: &str| params.get(name).map(String::as_str);

    if param("grant_type") != Some("authorization_code") {
        return oauth_error(
            StatusCode::BAD_REQUEST,
            "unsupported_grant_type",
            "Only authorization_code is supported",
        );
    }

    if let Some(secret) = &behavior.client_secret {
        if param("client_secret") != Some(secret.as_str()) {
            return oauth_error(
                StatusCode::UNAUTHORIZED,
                "invalid_client",
                "Client authentication failed",
            );
        }
    }

    let Some(code) = param("code").filter(|code| !code.is_empty()) else {
        return oauth_error(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            "Missing authorization code",
        );
    };

    let mut codes = provider.codes.lock().unwrap();
    let Some(issued) = codes.get(code).cloned() else {
        return oauth_error(
            StatusCode::BAD_REQUEST,
            "invalid_grant",
            "Unknown or already used authorization code",
        );
    };

    if param("client_id") != Some(issued.client_id.as_str())
        || param("redirect_uri") != Some(issued.redirect_uri.as_str())
    {
        return oauth_error(
            StatusCode::BAD_REQUEST,
            "invalid_grant",
            "client_id or redirect_uri does not match the authorization request",
        );
    }

    let verifier = param("code_verifier").unwrap_or_default();
    if s256(verifier) != issued.code_challenge {
        return oauth_error(
            StatusCode::BAD_REQUEST,
            "invalid_grant",
            "PKCE verification failed",
        );
    }

    codes.remove(code);
    drop(codes);

    let mut body = json!({
        "access_token": behavior.access_token,
        "id_token": behavior.id_token,
        "token_type": "Bearer"
    });
    if let Some(expires_in) = behavior.expires_in {
        body["expires_in"] = json!(expires_in);
    }
    if let Some(scope) = &behavior.scope {
        body["scope"] = json!(scope);
    }

    Json(body).into_response()
}

async fn userinfo(State(provider): State<Arc<StubProvider>>, headers: HeaderMap) -> Response {
    *provider.userinfo_calls.lock().unwrap() += 1;

    if let Some(status) = provider.behavior.userinfo_status {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return oauth_error(status, "server_error", "Userinfo endpoint configured to fail");
    }

    let expected = format!("Bearer {}", provider.behavior.access_token);
    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    if presented != Some(expected.as_str()) {
        return oauth_error(StatusCode::UNAUTHORIZED, "invalid_token", "Bad bearer token");
    }

    Json(provider.behavior.user.clone()).into_response()
}
