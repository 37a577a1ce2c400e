use crate::response::SuccessTokenResponse;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::{Duration, OffsetDateTime};
use url::Url;

/// The token record held for one authentication event, persisted so a
/// session survives page reloads.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub(crate) struct TokenData {
    /// Access token. Allows access to resources requiring authentication
    /// unless expired.
    pub(crate) access_token: String,

    /// May be used to obtain a new access token without user intervention.
    /// Not every client configuration issues one.
    pub(crate) refresh_token: Option<String>,

    /// Identity assertion for the logged-in user. Also passed back to the
    /// provider as a hint during logout.
    pub(crate) id_token: Option<String>,

    #[serde(with = "time::serde::rfc3339")]
    pub(crate) access_token_expires_at: OffsetDateTime,

    #[serde(with = "time::serde::rfc3339::option")]
    pub(crate) refresh_expires_at: Option<OffsetDateTime>,

    /// Point in time this record was received from the token endpoint.
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) time_received: OffsetDateTime,

    /// The discovery endpoint this record was minted against. A persisted
    /// record from a different provider or realm is invalid and must be
    /// discarded on restore.
    pub(crate) source: Url,
}

impl TokenData {
    pub(crate) fn from_response(
        response: SuccessTokenResponse,
        source: Url,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            id_token: response.id_token,
            access_token_expires_at: now + Duration::seconds(response.expires_in),
            refresh_expires_at: response
                .refresh_expires_in
                .map(|expires_in| now + Duration::seconds(expires_in)),
            time_received: now,
            source,
        }
    }

    pub(crate) fn access_token_time_left(&self, now: OffsetDateTime) -> Duration {
        self.access_token_expires_at - now
    }

    pub(crate) fn access_token_expired(&self, now: OffsetDateTime) -> bool {
        self.access_token_expires_at <= now
    }

    /// A refresh token without a known expiry counts as usable.
    pub(crate) fn refresh_token_expired(&self, now: OffsetDateTime) -> bool {
        self.refresh_expires_at
            .map(|expires_at| expires_at <= now)
            .unwrap_or(false)
    }

    pub(crate) fn can_refresh(&self, now: OffsetDateTime) -> bool {
        self.refresh_token.is_some() && !self.refresh_token_expired(now)
    }
}

/// Decoded JWT claims, as far as this tool models them. Everything beyond
/// the modelled fields is captured verbatim for display.
///
/// All fields are optional: the claim set shown to the user is whatever the
/// provider put into the token, substituted with blanks where absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenClaims {
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,

    /// Issued-at, seconds since the Unix epoch.
    pub iat: i64,

    pub iss: String,

    /// Subject identifier of the end-user.
    pub sub: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,

    /// Realm roles. Only present when roles are added to tokens in the
    /// Keycloak admin UI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realm_access: Option<Access>,

    /// Client-scoped roles, keyed by client ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_access: Option<BTreeMap<String, Access>>,

    #[serde(flatten)]
    pub additional: BTreeMap<String, serde_json::Value>,
}

/// A list of role names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Access {
    pub roles: Vec<String>,
}

impl TokenClaims {
    /// Realm-level roles, in token order. Empty when the claim path
    /// `realm_access.roles` is absent.
    pub fn realm_roles(&self) -> Vec<String> {
        self.realm_access
            .as_ref()
            .map(|access| access.roles.clone())
            .unwrap_or_default()
    }

    /// Roles scoped to one client, from `resource_access.{client}.roles`.
    pub fn client_roles(&self, client_id: &str) -> Vec<String> {
        self.resource_access
            .as_ref()
            .and_then(|resources| resources.get(client_id))
            .map(|access| access.roles.clone())
            .unwrap_or_default()
    }

    pub fn has_realm_role(&self, role: &str) -> bool {
        self.realm_access
            .as_ref()
            .map(|access| access.roles.iter().any(|candidate| candidate == role))
            .unwrap_or(false)
    }

    /// The claim set as indented JSON, for display.
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Decodes the payload segment of a JWT without verifying its signature.
/// Signature handling is the provider's concern; this tool only displays
/// what the token asserts. Returns `None` for opaque or malformed tokens.
pub(crate) fn decode_claims(token: &str) -> Option<TokenClaims> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .inspect_err(|err| tracing::debug!(%err, "Token payload is not base64url"))
        .ok()?;
    serde_json::from_slice(&bytes)
        .inspect_err(|err| tracing::debug!(%err, "Token payload is not a JSON claim set"))
        .ok()
}

/// The assembled view over one authentication event: the three raw token
/// strings plus the decoded claim sets of the two JWT-format tokens. Fields
/// the provider did not issue are blank rather than absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenInfo {
    pub access_token: String,
    pub refresh_token: String,
    pub id_token: String,
    pub access_claims: TokenClaims,
    pub id_claims: TokenClaims,
}

impl TokenInfo {
    pub(crate) fn from_token_data(token: &TokenData) -> Self {
        Self {
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone().unwrap_or_default(),
            id_token: token.id_token.clone().unwrap_or_default(),
            access_claims: decode_claims(&token.access_token).unwrap_or_default(),
            id_claims: token
                .id_token
                .as_deref()
                .and_then(decode_claims)
                .unwrap_or_default(),
        }
    }
}
