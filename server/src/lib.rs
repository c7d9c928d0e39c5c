//! OIDC relying-party relay: drives an Authorization Code + PKCE login against an
//! OpenID Provider on behalf of a browser-facing frontend.

pub mod config;
pub mod errors;
pub mod flow;
pub mod oauth;
pub mod routes;
pub mod setup;
pub mod state;

pub use config::{OidcConfig, ServerConfig};
pub use flow::{FlowError, OidcFlow, StartResponse};
pub use state::AppState;
