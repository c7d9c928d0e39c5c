use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::oauth::token::OAuthTokenSet;
use crate::oauth::userinfo::UserInfo;

/// Represents the data kept between Start and Complete for one login attempt
#[derive(Clone)]
pub struct PendingLogin {
    /// PKCE code verifier - the original random string
    pub code_verifier: String,
    /// When Start issued the state for this login
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for PendingLogin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingLogin")
            .field("code_verifier", &"<redacted>")
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl PendingLogin {
    pub fn new(code_verifier: String) -> Self {
        Self {
            code_verifier,
            created_at: Utc::now(),
        }
    }

    /// Check if this login is older than `ttl`
    pub fn is_expired(&self, ttl: Duration) -> bool {
        (Utc::now() - self.created_at)
            .to_std()
            .map(|age| age > ttl)
            .unwrap_or(false)
    }
}

/// A completed login, as returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub id_token: String,
    pub expires_in: u64,
    pub scope: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserInfo>,
}

impl Session {
    pub fn from_token_set(tokens: OAuthTokenSet, user: Option<UserInfo>) -> Self {
        Self {
            access_token: tokens.access_token,
            id_token: tokens.id_token,
            expires_in: tokens.expires_in,
            scope: tokens.scope,
            user,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_login_is_not_expired() {
        let login = PendingLogin::new("verifier".to_string());
        assert!(!login.is_expired(Duration::from_secs(60)));
    }

    #[test]
    fn test_old_login_is_expired() {
        let login = PendingLogin {
            code_verifier: "verifier".to_string(),
            created_at: Utc::now() - chrono::Duration::seconds(120),
        };
        assert!(login.is_expired(Duration::from_secs(60)));
    }

    #[test]
    fn test_session_serializes_snake_case() {
        let session = Session::from_token_set(
            OAuthTokenSet {
                access_token: "AT1".to_string(),
                id_token: "IT1".to_string(),
                expires_in: 120,
                scope: "openid".to_string(),
            },
            Some(UserInfo {
                sub: "u1".to_string(),
                email: "a@b.com".to_string(),
                name: None,
            }),
        );

        assert_eq!(
            serde_json::to_value(&session).unwrap(),
            serde_json::json!({
                "access_token": "AT1",
                "id_token": "IT1",
                "expires_in": 120,
                "scope": "openid",
                "user": {"sub": "u1", "email": "a@b.com"}
            })
        );
    }

    #[test]
    fn test_session_without_user_omits_the_field() {
        let session = Session::from_token_set(
            OAuthTokenSet {
                access_token: "AT1".to_string(),
                id_token: "IT1".to_string(),
                expires_in: 3600,
                scope: "openid".to_string(),
            },
            None,
        );

        let value = serde_json::to_value(&session).unwrap();
        assert!(value.get("user").is_none());
    }
}
