use crate::browser;
use crate::config::SessionConfig;
use crate::error::{
    CallbackSnafu, IncompleteConfigSnafu, InitSnafu, MetadataSnafu, NoBrowserContextSnafu,
    NotAuthenticatedSnafu, NotInitializedSnafu, RefreshSnafu, SessionError,
};
use crate::oidc::Endpoints;
use crate::pkce::{self, CodeVerifier};
use crate::request::{self, RequestError};
use crate::response::AuthCallback;
use crate::token::{TokenData, TokenInfo, decode_claims};
use crate::{login, logout, silent};
use snafu::{OptionExt, ResultExt, ensure};
use time::{Duration, OffsetDateTime};
use url::Url;

/// Path of the dedicated same-origin page the hidden-iframe silent check
/// redirects to. Must be served as a static asset next to the application.
pub const SILENT_CHECK_PAGE: &str = "/silent-check-sso.html";

/// Minimum remaining access-token validity below which a requested refresh
/// actually hits the token endpoint. With more validity left, the request is
/// acknowledged without a round trip.
const MIN_TOKEN_VALIDITY: Duration = Duration::seconds(5);

const TOKEN_STORAGE_KEY: &str = "keycloak_session__token";
const VERIFIER_STORAGE_KEY: &str = "keycloak_session__pkce_verifier";
const STATE_STORAGE_KEY: &str = "keycloak_session__state";

/// The result of a requested token refresh. `refreshed` distinguishes an
/// actual renewal from tokens that were still valid enough to keep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub refreshed: bool,
    pub message: String,
}

/// Owns at most one live provider client and exposes the narrow session
/// contract the UI drives: initialize, login, logout, refresh, and
/// token/role introspection.
///
/// Re-initializing replaces the previous client wholesale; callers must not
/// hold state derived from a client across a re-initialize. [`Self::clear`]
/// returns the adapter to its uninitialized state.
#[derive(Debug, Default)]
pub struct SessionAdapter {
    client: Option<ProviderClient>,
}

impl SessionAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Constructs the provider client for `config` and performs the
    /// non-interactive check for an existing session: a login callback in
    /// the current URL, a persisted token record, or (unless disabled) a
    /// hidden-iframe silent SSO round trip.
    ///
    /// Leftover authorization-response parameters are scrubbed from the
    /// visible URL afterwards, whether or not the check succeeded.
    pub async fn initialize(
        &mut self,
        config: &SessionConfig,
        disable_silent_sso: bool,
    ) -> Result<(), SessionError> {
        let missing = config.missing_fields();
        ensure!(
            missing.is_empty(),
            IncompleteConfigSnafu {
                fields: missing.join(", "),
            }
        );

        let discovery_endpoint = config.discovery_endpoint()?;
        let redirect_uri = browser::current_origin().context(NoBrowserContextSnafu)?;

        let oidc_config = request::retrieve_oidc_config(discovery_endpoint.clone())
            .await
            .context(InitSnafu)?;
        let endpoints = Endpoints::try_from_config(&oidc_config).context(MetadataSnafu)?;

        let mut client = ProviderClient {
            client_id: config.client_id.trim().to_owned(),
            discovery_endpoint,
            endpoints,
            redirect_uri,
            token: None,
        };

        let check = client.check_existing_session(disable_silent_sso).await;

        // Whatever the check concluded, stale authorization-response
        // parameters must not survive in the visible URL where they would be
        // reprocessed on the next load.
        if browser::has_auth_response_params() {
            browser::scrub_auth_params();
        }

        // The old client (if any) is replaced even when the check failed, so
        // that a failed re-initialize does not leave a stale session behind.
        self.client = Some(client);
        check
    }

    /// Starts an interactive login: persists fresh PKCE/CSRF material and
    /// redirects the page to the provider's login form. This call does not
    /// return in any useful sense; the session outcome is observed by the
    /// `initialize` check on the next page load.
    pub fn login(&self) -> Result<(), SessionError> {
        let client = self.client.as_ref().context(NotInitializedSnafu)?;

        let verifier = CodeVerifier::generate();
        let state = pkce::generate_state();
        browser::session_set(VERIFIER_STORAGE_KEY, verifier.secret());
        browser::session_set(STATE_STORAGE_KEY, &state);

        let url = login::authorization_url(
            &client.endpoints.authorization,
            &client.client_id,
            &client.redirect_uri,
            &[],
            &verifier.challenge(),
            &state,
            false,
        );
        tracing::debug!(%url, "Redirecting to the provider login page.");
        browser::redirect(&url);
        Ok(())
    }

    /// Starts a redirect-based logout at the provider, returning to the
    /// current origin. Local token state is dropped up front, so the user is
    /// logged out locally even if the provider round trip goes wrong.
    pub fn logout(&mut self) -> Result<(), SessionError> {
        let client = self.client.as_mut().context(NotInitializedSnafu)?;

        let id_token_hint = client.token.as_ref().and_then(|token| token.id_token.clone());
        client.forget_token();

        match client.endpoints.end_session.clone() {
            Some(end_session_endpoint) => {
                let url = logout::end_session_url(
                    &end_session_endpoint,
                    &client.redirect_uri,
                    &client.client_id,
                    id_token_hint.as_deref(),
                );
                tracing::debug!(%url, "Redirecting to the provider logout endpoint.");
                browser::redirect(&url);
            }
            None => {
                tracing::warn!(
                    "Provider advertises no end-session endpoint. Only local state was cleared."
                );
            }
        }
        Ok(())
    }

    /// Renews the token set when fewer than [`MIN_TOKEN_VALIDITY`] of
    /// access-token validity remain. Both the renewed and the
    /// still-valid-enough case are successes, told apart by the outcome.
    /// On failure the previous token set is retained.
    pub async fn refresh_token(&mut self) -> Result<RefreshOutcome, SessionError> {
        let client = self.client.as_mut().context(NotInitializedSnafu)?;
        let token = client.token.as_ref().context(NotAuthenticatedSnafu)?;

        let now = OffsetDateTime::now_utc();
        if token.access_token_time_left(now) >= MIN_TOKEN_VALIDITY {
            return Ok(RefreshOutcome {
                refreshed: false,
                message: "Token was still valid, no refresh was necessary".to_owned(),
            });
        }

        client.renew(now).await.context(RefreshSnafu)?;
        Ok(RefreshOutcome {
            refreshed: true,
            message: "Token successfully refreshed".to_owned(),
        })
    }

    /// Mirrors the underlying client's authenticated flag; `false` when no
    /// client exists.
    pub fn is_authenticated(&self) -> bool {
        self.client
            .as_ref()
            .map(ProviderClient::authenticated)
            .unwrap_or(false)
    }

    /// The current token set, or `None` when not initialized or not
    /// authenticated. Total over an authenticated adapter: missing fields
    /// come back blank, never as an error.
    pub fn token_info(&self) -> Option<TokenInfo> {
        let client = self.client.as_ref()?;
        client.token.as_ref().map(TokenInfo::from_token_data)
    }

    /// Realm-level role names from the access token, in token order. Empty
    /// when unauthenticated or when the token carries no roles.
    pub fn user_roles(&self) -> Vec<String> {
        self.access_claims()
            .map(|claims| claims.realm_roles())
            .unwrap_or_default()
    }

    /// Client-scoped role names from the access token's `resource_access`
    /// claim.
    pub fn client_roles(&self, client_id: &str) -> Vec<String> {
        self.access_claims()
            .map(|claims| claims.client_roles(client_id))
            .unwrap_or_default()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.access_claims()
            .map(|claims| claims.has_realm_role(role))
            .unwrap_or(false)
    }

    /// Discards all token state and drops the client. The next use requires
    /// re-initialization.
    pub fn clear(&mut self) {
        if let Some(mut client) = self.client.take() {
            client.forget_token();
        }
    }

    fn access_claims(&self) -> Option<crate::token::TokenClaims> {
        let client = self.client.as_ref()?;
        let token = client.token.as_ref()?;
        Some(decode_claims(&token.access_token).unwrap_or_default())
    }
}

/// The one concrete client bound to a {server, realm, client id} triple.
/// Everything provider-protocol-shaped lives behind this type; the adapter
/// surface above never leaks it.
#[derive(Debug)]
struct ProviderClient {
    client_id: String,
    discovery_endpoint: Url,
    endpoints: Endpoints,

    /// Return target for interactive login and logout: the current origin.
    redirect_uri: Url,

    token: Option<TokenData>,
}

impl ProviderClient {
    fn authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// The non-interactive session check run during initialization.
    async fn check_existing_session(
        &mut self,
        disable_silent_sso: bool,
    ) -> Result<(), SessionError> {
        // A completed redirect round trip takes precedence: the URL carries
        // an authorization code (or an error) for us.
        if let Some(url) = browser::current_url()
            && let Some(callback) = AuthCallback::from_url(&url)
        {
            self.consume_login_callback(callback).await?;
        }

        // Otherwise a previous session may have been persisted.
        if self.token.is_none() {
            self.restore_persisted_token().await;
        }

        // As a last resort, ask the provider itself, invisibly.
        if self.token.is_none() && !disable_silent_sso {
            self.silent_check().await;
        }

        Ok(())
    }

    /// Exchanges the code of a visible-URL login callback, guarded by the
    /// state value and PKCE verifier persisted when the login was started.
    async fn consume_login_callback(&mut self, callback: AuthCallback) -> Result<(), SessionError> {
        let (code, session_state, returned_state) = match callback {
            AuthCallback::Login {
                code,
                session_state,
                state,
            } => (code, session_state, state),
            AuthCallback::Error(error_response) => {
                return Err(SessionError::Callback {
                    source: RequestError::ErrResponse { error_response },
                });
            }
        };

        let expected_state = browser::session_get(STATE_STORAGE_KEY);
        browser::session_remove(STATE_STORAGE_KEY);
        if let Some(expected) = &expected_state
            && returned_state.as_deref() != Some(expected.as_str())
        {
            tracing::warn!(
                "Authorization response carries an unexpected state value. Ignoring the callback."
            );
            return Ok(());
        }

        let Some(verifier) = browser::session_get(VERIFIER_STORAGE_KEY).map(CodeVerifier::restore)
        else {
            tracing::warn!(
                "Authorization response without a stored PKCE verifier. Ignoring the callback."
            );
            return Ok(());
        };
        browser::session_remove(VERIFIER_STORAGE_KEY);

        let response = request::exchange_code_for_token(
            self.endpoints.token.clone(),
            &self.client_id,
            self.redirect_uri.as_str(),
            &code,
            &verifier,
            session_state.as_deref(),
        )
        .await
        .context(CallbackSnafu)?;

        self.install_token(TokenData::from_response(
            response,
            self.discovery_endpoint.clone(),
            OffsetDateTime::now_utc(),
        ));
        Ok(())
    }

    /// Restores the persisted token record, if one exists, belongs to this
    /// provider, and is still usable. An expired access token is renewed via
    /// its refresh token where possible.
    async fn restore_persisted_token(&mut self) {
        let Some(raw) = browser::local_get(TOKEN_STORAGE_KEY) else {
            return;
        };
        let stored = match serde_json::from_str::<TokenData>(&raw) {
            Ok(stored) => stored,
            Err(err) => {
                tracing::warn!(%err, "Persisted token record is malformed. Dropping it.");
                browser::local_remove(TOKEN_STORAGE_KEY);
                return;
            }
        };

        if stored.source != self.discovery_endpoint {
            tracing::debug!(
                "Persisted token record belongs to a different provider configuration. Dropping it."
            );
            browser::local_remove(TOKEN_STORAGE_KEY);
            return;
        }

        let now = OffsetDateTime::now_utc();
        if !stored.access_token_expired(now) {
            self.token = Some(stored);
            return;
        }

        if stored.can_refresh(now) {
            self.token = Some(stored);
            if let Err(err) = self.renew(now).await {
                tracing::debug!(%err, "Could not renew the restored session. Dropping it.");
                self.forget_token();
            }
        } else {
            tracing::debug!("Persisted token record is fully expired. Dropping it.");
            browser::local_remove(TOKEN_STORAGE_KEY);
        }
    }

    /// The hidden-iframe `prompt=none` round trip. Best-effort only; any
    /// failure means "no existing session".
    async fn silent_check(&mut self) {
        let Ok(silent_redirect_uri) = self.redirect_uri.join(SILENT_CHECK_PAGE) else {
            return;
        };
        let verifier = CodeVerifier::generate();
        let state = pkce::generate_state();

        let callback = silent::check(
            &self.endpoints.authorization,
            &self.client_id,
            &silent_redirect_uri,
            &verifier,
            &state,
        )
        .await;

        match callback {
            Some(AuthCallback::Login {
                code,
                session_state,
                state: returned_state,
            }) => {
                if returned_state.as_deref() != Some(state.as_str()) {
                    tracing::warn!(
                        "Silent check answer carries an unexpected state value. Ignoring it."
                    );
                    return;
                }
                match request::exchange_code_for_token(
                    self.endpoints.token.clone(),
                    &self.client_id,
                    silent_redirect_uri.as_str(),
                    &code,
                    &verifier,
                    session_state.as_deref(),
                )
                .await
                {
                    Ok(response) => self.install_token(TokenData::from_response(
                        response,
                        self.discovery_endpoint.clone(),
                        OffsetDateTime::now_utc(),
                    )),
                    Err(err) => {
                        tracing::warn!(%err, "Silent check code exchange failed.");
                    }
                }
            }
            Some(AuthCallback::Error(error_response)) => {
                if error_response.is_no_existing_session() {
                    tracing::debug!("Silent check: no existing provider session.");
                } else {
                    tracing::warn!(%error_response, "Silent check answered with an error.");
                }
            }
            None => {}
        }
    }

    /// Performs the refresh grant and installs the renewed token record.
    /// Fields the refresh response omits are carried over from the previous
    /// record so a successful refresh never degrades the token set.
    async fn renew(&mut self, now: OffsetDateTime) -> Result<(), RequestError> {
        let Some(previous) = self.token.as_ref() else {
            tracing::debug!("Requested renewal has no effect, as no token is known.");
            return Ok(());
        };
        let Some(refresh_token) = previous.refresh_token.clone() else {
            tracing::debug!("Requested renewal has no effect, as no refresh token is known.");
            return Ok(());
        };

        let result = request::refresh_token(
            self.endpoints.token.clone(),
            &self.client_id,
            &refresh_token,
        )
        .await;
        let response = match result {
            Ok(response) => response,
            Err(err) => {
                if let RequestError::ErrResponse { error_response } = &err
                    && (error_response.is_invalid_refresh_token()
                        || error_response.is_session_not_active())
                {
                    tracing::debug!(
                        "The provider no longer accepts our refresh token. Dropping all token data."
                    );
                    self.forget_token();
                }
                return Err(err);
            }
        };

        let mut fresh = TokenData::from_response(response, self.discovery_endpoint.clone(), now);
        if let Some(previous) = self.token.as_ref() {
            if fresh.refresh_token.is_none() {
                fresh.refresh_token = previous.refresh_token.clone();
            }
            if fresh.id_token.is_none() {
                fresh.id_token = previous.id_token.clone();
            }
        }
        self.install_token(fresh);
        Ok(())
    }

    fn install_token(&mut self, token: TokenData) {
        match serde_json::to_string(&token) {
            Ok(json) => browser::local_set(TOKEN_STORAGE_KEY, &json),
            Err(err) => tracing::warn!(%err, "Could not serialize the token record."),
        }
        self.token = Some(token);
    }

    fn forget_token(&mut self) {
        self.token = None;
        browser::local_remove(TOKEN_STORAGE_KEY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assertr::prelude::*;

    #[test]
    fn uninitialized_adapter_reports_unauthenticated() {
        let adapter = SessionAdapter::new();
        assert_that(adapter.is_authenticated()).is_false();
        assert_that(adapter.token_info().is_none()).is_true();
        assert_that(adapter.user_roles()).has_length(0);
        assert_that(adapter.has_role("admin")).is_false();
    }

    #[test]
    fn initialize_rejects_an_incomplete_config_before_any_network_activity() {
        let mut adapter = SessionAdapter::new();
        let config = SessionConfig {
            url: String::new(),
            realm: "master".to_owned(),
            client_id: String::new(),
            disable_silent_sso: false,
        };
        // Resolves synchronously: the config is rejected before the first
        // request is sent.
        let err = futures::executor::block_on(adapter.initialize(&config, false)).unwrap_err();
        match err {
            SessionError::IncompleteConfig { fields } => {
                assert_that(fields.as_str()).is_equal_to("Keycloak URL, client ID");
            }
            other => panic!("expected IncompleteConfig, got {other:?}"),
        }
    }

    #[test]
    fn login_without_initialization_is_rejected() {
        let adapter = SessionAdapter::new();
        let err = adapter.login().unwrap_err();
        assert_that(matches!(err, SessionError::NotInitialized)).is_true();
    }

    #[test]
    fn logout_without_initialization_is_rejected() {
        let mut adapter = SessionAdapter::new();
        let err = adapter.logout().unwrap_err();
        assert_that(matches!(err, SessionError::NotInitialized)).is_true();
    }

    #[test]
    fn clear_on_an_uninitialized_adapter_is_a_no_op() {
        let mut adapter = SessionAdapter::new();
        adapter.clear();
        assert_that(adapter.is_authenticated()).is_false();
    }

    #[test]
    fn refresh_threshold_is_five_seconds() {
        assert_that(MIN_TOKEN_VALIDITY).is_equal_to(Duration::seconds(5));
    }
}
