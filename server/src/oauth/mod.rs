//! OAuth/OIDC building blocks for the relying-party flow
//! This includes PKCE, provider discovery, the token and userinfo calls, and the
//! in-memory login and session stores

pub mod discovery;
pub mod error;
pub mod pkce;
pub mod session;
pub mod store;
pub mod token;
pub mod userinfo;
pub mod utils;

pub use discovery::ProviderMetadata;
pub use error::UpstreamError;
pub use session::{PendingLogin, Session};
pub use store::FlowStore;
pub use token::OAuthTokenSet;
pub use userinfo::UserInfo;
