//! Browser-side Keycloak session handling for diagnostics tooling.
//!
//! This crate drives a single authorization-code-with-PKCE session against a
//! Keycloak realm: OIDC discovery, interactive login and logout redirects, a
//! non-interactive check for an existing session (persisted tokens, a login
//! callback in the current URL, or a hidden-iframe silent SSO round trip),
//! and manual token refresh.
//!
//! The entry point is [`SessionAdapter`], which owns at most one live
//! provider client at a time:
//!
//! ```no_run
//! use keycloak_session::{SessionAdapter, SessionConfig};
//!
//! # async fn example() -> Result<(), keycloak_session::SessionError> {
//! let config = SessionConfig {
//!     url: "https://auth.example.com".to_owned(),
//!     realm: "master".to_owned(),
//!     client_id: "my-client".to_owned(),
//!     disable_silent_sso: false,
//! };
//!
//! let mut adapter = SessionAdapter::new();
//! adapter.initialize(&config, config.disable_silent_sso).await?;
//!
//! if adapter.is_authenticated() {
//!     let _info = adapter.token_info().expect("authenticated");
//!     tracing::info!(roles = ?adapter.user_roles(), "session restored");
//! } else {
//!     // Leaves the page; the session is picked up on the next load.
//!     adapter.login()?;
//! }
//! # Ok(())
//! # }
//! ```

mod browser;
mod config;
mod error;
mod expiry;
mod login;
mod logout;
mod oidc;
mod pkce;
mod request;
mod response;
mod session;
mod silent;
mod token;

pub use config::{ConfigStore, SessionConfig};
pub use error::SessionError;
pub use expiry::format_expires_in;
pub use oidc::MetadataError;
pub use request::RequestError;
pub use response::{ErrorResponse, KnownOidcErrorCode, OidcErrorCode};
pub use session::{RefreshOutcome, SessionAdapter, SILENT_CHECK_PAGE};
pub use token::{Access, TokenClaims, TokenInfo};

pub mod url {
    pub use url::Url;
}

pub(crate) type AuthorizationCode = String;
pub(crate) type SessionState = String;
