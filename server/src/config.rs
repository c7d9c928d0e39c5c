use std::net::SocketAddr;
use std::time::Duration;

use color_eyre::eyre::{eyre, WrapErr};

pub const DEFAULT_PROVIDER_URL: &str = "http://localhost:8000";
pub const DEFAULT_CLIENT_ID: &str = "oidc-relay";
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:3000/callback";
pub const DEFAULT_SCOPE: &str = "openid profile email";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_FRONTEND_ORIGIN: &str = "http://localhost:3000";

/// Relying-party settings used for every request to the OpenID Provider.
///
/// All defaults are applied here, once, so the flow logic never has to look at the
/// environment.
#[derive(Clone)]
pub struct OidcConfig {
    /// Base URL of the provider, without a trailing slash
    pub provider_url: String,
    pub client_id: String,
    /// Sent to the token endpoint when present
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    /// Space-delimited scope requested at the authorization endpoint
    pub scope: String,
    /// Applied to each outbound request individually
    pub request_timeout: Duration,
    /// Pending logins older than this are treated as unknown. `None` keeps them forever.
    pub pending_login_ttl: Option<Duration>,
}

impl std::fmt::Debug for OidcConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcConfig")
            .field("provider_url", &self.provider_url)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("redirect_uri", &self.redirect_uri)
            .field("scope", &self.scope)
            .field("request_timeout", &self.request_timeout)
            .field("pending_login_ttl", &self.pending_login_ttl)
            .finish()
    }
}

impl OidcConfig {
    pub fn new(
        provider_url: impl Into<String>,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            provider_url: normalize_base_url(&provider_url.into()),
            client_id: client_id.into(),
            client_secret: None,
            redirect_uri: redirect_uri.into(),
            scope: DEFAULT_SCOPE.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            pending_login_ttl: None,
        }
    }

    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        let secret = secret.into();
        self.client_secret = (!secret.is_empty()).then_some(secret);
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_pending_login_ttl(mut self, ttl: Duration) -> Self {
        self.pending_login_ttl = Some(ttl);
        self
    }

    pub fn from_env() -> color_eyre::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> color_eyre::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let mut config = Self::new(
            get("OIDC_PROVIDER_URL").unwrap_or_else(|| DEFAULT_PROVIDER_URL.to_string()),
            get("OIDC_CLIENT_ID").unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string()),
            get("OIDC_REDIRECT_URI").unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string()),
        );

        if let Some(secret) = get("OIDC_CLIENT_SECRET") {
            config = config.with_client_secret(secret);
        }
        if let Some(scope) = get("OIDC_SCOPE") {
            config = config.with_scope(scope);
        }
        if let Some(secs) = get("OIDC_HTTP_TIMEOUT_SECS") {
            config = config.with_request_timeout(Duration::from_secs(parse_secs(
                "OIDC_HTTP_TIMEOUT_SECS",
                &secs,
            )?));
        }
        if let Some(secs) = get("OIDC_PENDING_LOGIN_TTL_SECS") {
            config = config.with_pending_login_ttl(Duration::from_secs(parse_secs(
                "OIDC_PENDING_LOGIN_TTL_SECS",
                &secs,
            )?));
        }

        Ok(config)
    }

    /// Fallback endpoint used when discovery did not provide one, e.g. `{provider}/oidc/token`
    pub fn default_endpoint(&self, name: &str) -> String {
        format!("{}/oidc/{}", self.provider_url, name)
    }

    pub fn discovery_url(&self) -> String {
        format!("{}/.well-known/openid-configuration", self.provider_url)
    }
}

/// Settings for the HTTP surface
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub frontend_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            frontend_origin: DEFAULT_FRONTEND_ORIGIN.to_string(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> color_eyre::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> color_eyre::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        let port = match get("PORT") {
            Some(port) => port
                .trim()
                .parse::<u16>()
                .wrap_err_with(|| format!("PORT must be a valid port number, got {port:?}"))?,
            None => defaults.port,
        };

        Ok(Self {
            host: get("HOST").unwrap_or(defaults.host),
            port,
            frontend_origin: get("FRONTEND_ORIGIN")
                .map(|origin| normalize_base_url(&origin))
                .unwrap_or(defaults.frontend_origin),
        })
    }

    /// Resolves `HOST` as either an IP literal or a hostname such as `localhost`
    pub async fn bind_addr(&self) -> color_eyre::Result<SocketAddr> {
        tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .wrap_err_with(|| {
                format!("Failed to resolve bind address {}:{}", self.host, self.port)
            })?
            .next()
            .ok_or_else(|| eyre!("No address found for {}:{}", self.host, self.port))
    }
}

fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn parse_secs(key: &str, value: &str) -> color_eyre::Result<u64> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|e| eyre!("{key} must be a whole number of seconds, got {value:?}: {e}"))
}
