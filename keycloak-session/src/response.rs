use crate::{AuthorizationCode, SessionState};
use serde::{Deserialize, Serialize};
use url::Url;

/// The authorization response the provider appended to our redirect URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AuthCallback {
    Login {
        code: AuthorizationCode,
        session_state: Option<SessionState>,

        /// Echo of the `state` value we sent with the authorization request.
        state: Option<String>,
    },
    Error(ErrorResponse),
}

impl AuthCallback {
    /// Extracts an authorization response from a redirect-target URL.
    /// Keycloak uses query parameters by default; fragment-encoded responses
    /// are handled as well. Returns `None` for a clean URL.
    pub(crate) fn from_url(url: &Url) -> Option<Self> {
        let query = url.query_pairs().collect::<Vec<_>>();
        if let Some(callback) = Self::from_pairs(&query) {
            return Some(callback);
        }
        let fragment = url.fragment()?;
        let pairs = url::form_urlencoded::parse(fragment.as_bytes()).collect::<Vec<_>>();
        Self::from_pairs(&pairs)
    }

    fn from_pairs(pairs: &[(std::borrow::Cow<'_, str>, std::borrow::Cow<'_, str>)]) -> Option<Self> {
        let get = |name: &str| {
            pairs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.to_string())
        };

        if let Some(code) = get("code") {
            return Some(AuthCallback::Login {
                code,
                session_state: get("session_state"),
                state: get("state"),
            });
        }

        let error = get("error")?;
        let error = serde_json::from_str::<OidcErrorCode>(&format!("\"{error}\""))
            .unwrap_or(OidcErrorCode::Unknown(error));
        Some(AuthCallback::Error(ErrorResponse {
            error,
            error_description: get("error_description"),
            error_uri: get("error_uri"),
        }))
    }
}

/// The response of the token endpoint, for both the authorization-code
/// exchange and the refresh grant.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub(crate) enum TokenResponse {
    Success(SuccessTokenResponse),
    Error(ErrorResponse),
}

/// A successful token response. The provider may omit the refresh and ID
/// tokens depending on client and scope configuration; both are optional.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub(crate) struct SuccessTokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    pub refresh_token: Option<String>,
    pub refresh_expires_in: Option<i64>,
    pub id_token: Option<String>,
    pub token_type: Option<String>,
    #[serde(rename = "not-before-policy")]
    pub not_before_policy: Option<i64>,
    pub session_state: Option<String>,
    pub scope: Option<String>,
}

/// Error codes defined by [RFC 6749 Section 5.2](https://datatracker.ietf.org/doc/html/rfc6749#section-5.2).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KnownOidcErrorCode {
    InvalidRequest,
    InvalidClient,
    InvalidGrant,
    UnauthorizedClient,
    UnsupportedGrantType,
    InvalidScope,

    /// Returned to a `prompt=none` authorization request when the provider
    /// would need to show the login page.
    LoginRequired,
    InteractionRequired,
    ConsentRequired,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum OidcErrorCode {
    Known(KnownOidcErrorCode),
    Unknown(String),
}

/// OAuth/OIDC error response as returned by Keycloak during authorization,
/// token exchange or token refresh.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ErrorResponse {
    pub error: OidcErrorCode,
    pub error_description: Option<String>,
    pub error_uri: Option<String>,
}

impl ErrorResponse {
    /// Whether this response reports an invalid or expired refresh token.
    pub fn is_invalid_refresh_token(&self) -> bool {
        self.error == OidcErrorCode::Known(KnownOidcErrorCode::InvalidGrant)
            && self
                .error_description
                .as_deref()
                .unwrap_or_default()
                .eq_ignore_ascii_case("Invalid refresh token")
    }

    /// Whether this response reports that the provider-side session ended.
    /// Any still-known refresh token can be dropped in that case.
    pub fn is_session_not_active(&self) -> bool {
        self.error == OidcErrorCode::Known(KnownOidcErrorCode::InvalidGrant)
            && self
                .error_description
                .as_deref()
                .unwrap_or_default()
                .eq_ignore_ascii_case("Session not active")
    }

    /// Whether this is the expected "no existing provider session" answer to
    /// a silent, `prompt=none` authorization request.
    pub fn is_no_existing_session(&self) -> bool {
        matches!(
            self.error,
            OidcErrorCode::Known(
                KnownOidcErrorCode::LoginRequired
                    | KnownOidcErrorCode::InteractionRequired
                    | KnownOidcErrorCode::ConsentRequired
            )
        )
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = match &self.error {
            OidcErrorCode::Known(known) => serde_json::to_string(known)
                .unwrap_or_default()
                .trim_matches('"')
                .to_owned(),
            OidcErrorCode::Unknown(other) => other.clone(),
        };
        match &self.error_description {
            Some(description) => write!(f, "{code}: {description}"),
            None => write!(f, "{code}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assertr::prelude::*;

    #[test]
    fn deserialize_known_error_code() {
        let parsed = serde_json::from_str::<OidcErrorCode>("\"invalid_grant\"").unwrap();
        assert_that(parsed).is_equal_to(OidcErrorCode::Known(KnownOidcErrorCode::InvalidGrant));
    }

    #[test]
    fn deserialize_unknown_error_code() {
        let parsed = serde_json::from_str::<OidcErrorCode>("\"some_unknown_error\"").unwrap();
        assert_that(parsed).is_equal_to(OidcErrorCode::Unknown("some_unknown_error".to_owned()));
    }

    #[test]
    fn login_callback_is_parsed_from_query_parameters() {
        let url = Url::parse(
            "http://127.0.0.1:3000/?state=abc&session_state=s-1&code=the-code&iss=issuer",
        )
        .unwrap();
        assert_that(AuthCallback::from_url(&url)).is_equal_to(Some(AuthCallback::Login {
            code: "the-code".to_owned(),
            session_state: Some("s-1".to_owned()),
            state: Some("abc".to_owned()),
        }));
    }

    #[test]
    fn login_callback_is_parsed_from_the_fragment() {
        let url = Url::parse("http://127.0.0.1:3000/#code=the-code&state=abc").unwrap();
        assert_that(AuthCallback::from_url(&url)).is_equal_to(Some(AuthCallback::Login {
            code: "the-code".to_owned(),
            session_state: None,
            state: Some("abc".to_owned()),
        }));
    }

    #[test]
    fn error_callback_is_parsed() {
        let url = Url::parse(
            "http://127.0.0.1:3000/?error=login_required&error_description=not%20logged%20in",
        )
        .unwrap();
        let Some(AuthCallback::Error(error)) = AuthCallback::from_url(&url) else {
            panic!("expected an error callback");
        };
        assert_that(error.is_no_existing_session()).is_true();
        assert_that(error.error_description).is_equal_to(Some("not logged in".to_owned()));
    }

    #[test]
    fn clean_url_yields_no_callback() {
        let url = Url::parse("http://127.0.0.1:3000/").unwrap();
        assert_that(AuthCallback::from_url(&url).is_none()).is_true();
    }

    #[test]
    fn token_response_distinguishes_success_and_error() {
        let success: TokenResponse = serde_json::from_str(
            r#"{"access_token": "at", "expires_in": 300, "refresh_token": "rt"}"#,
        )
        .unwrap();
        let TokenResponse::Success(success) = success else {
            panic!("expected a success response");
        };
        assert_that(success.expires_in).is_equal_to(300);
        assert_that(success.id_token.is_none()).is_true();

        let error: TokenResponse =
            serde_json::from_str(r#"{"error": "invalid_grant", "error_description": "Invalid refresh token"}"#)
                .unwrap();
        let TokenResponse::Error(error) = error else {
            panic!("expected an error response");
        };
        assert_that(error.is_invalid_refresh_token()).is_true();
    }

    fn invalid_grant(description: &str) -> ErrorResponse {
        ErrorResponse {
            error: OidcErrorCode::Known(KnownOidcErrorCode::InvalidGrant),
            error_description: Some(description.to_owned()),
            error_uri: None,
        }
    }

    #[test]
    fn invalid_refresh_token_detection_is_case_insensitive() {
        assert_that(invalid_grant("Invalid refresh token").is_invalid_refresh_token()).is_true();
        assert_that(invalid_grant("INVALID REFRESH TOKEN").is_invalid_refresh_token()).is_true();
        assert_that(invalid_grant("Token is not active").is_invalid_refresh_token()).is_false();
    }

    #[test]
    fn session_not_active_detection() {
        assert_that(invalid_grant("Session not active").is_session_not_active()).is_true();
        assert_that(invalid_grant("Invalid refresh token").is_session_not_active()).is_false();
    }

    #[test]
    fn error_response_display_is_human_readable() {
        let rendered = invalid_grant("Session not active").to_string();
        assert_that(rendered.as_str()).is_equal_to("invalid_grant: Session not active");
    }
}
