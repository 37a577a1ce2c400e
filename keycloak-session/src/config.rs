use crate::browser;
use crate::error::{InvalidServerUrlSnafu, SessionError};
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use url::Url;

/// Fixed key under which the configuration record is persisted in the
/// browser's local storage.
pub(crate) const CONFIG_STORAGE_KEY: &str = "keycloak_session__config";

/// The configuration identifying the Keycloak instance, realm and client to
/// exercise. All three identifying fields must be non-empty before a
/// connection attempt is allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Base URL of the Keycloak instance, e.g. "https://auth.example.com".
    pub url: String,

    /// The Keycloak realm to use.
    pub realm: String,

    /// The client ID as configured inside the Keycloak admin area.
    #[serde(rename = "clientId")]
    pub client_id: String,

    /// Skip the hidden-iframe silent SSO check. Required when a strict
    /// content security policy forbids framing the authorization endpoint.
    #[serde(rename = "disableSilentSSO")]
    pub disable_silent_sso: bool,
}

impl SessionConfig {
    /// Human-readable names of the identifying fields that are still empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.url.trim().is_empty() {
            missing.push("Keycloak URL");
        }
        if self.realm.trim().is_empty() {
            missing.push("realm");
        }
        if self.client_id.trim().is_empty() {
            missing.push("client ID");
        }
        missing
    }

    /// The realm's OIDC discovery document location.
    pub(crate) fn discovery_endpoint(&self) -> Result<Url, SessionError> {
        let mut url = Url::parse(self.url.trim()).context(InvalidServerUrlSnafu)?;
        url.path_segments_mut()
            .map_err(|()| url::ParseError::RelativeUrlWithCannotBeABaseBase)
            .context(InvalidServerUrlSnafu)?
            .pop_if_empty()
            .extend(["realms", &self.realm, ".well-known", "openid-configuration"]);
        Ok(url)
    }

    /// Parses a persisted record, merging it over the defaults. Malformed
    /// data yields the defaults; a corrupt local record must never block the
    /// tool from loading.
    pub(crate) fn merged_from_json(raw: &str) -> Self {
        match serde_json::from_str(raw) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(%err, "Persisted configuration is malformed. Falling back to defaults.");
                Self::default()
            }
        }
    }
}

/// Reads and writes the one [`SessionConfig`] record kept in local storage.
/// All operations are best-effort: storage failures are logged, never raised.
pub struct ConfigStore;

impl ConfigStore {
    /// The persisted configuration merged over defaults, or plain defaults
    /// if storage is empty, unreadable or malformed.
    pub fn load() -> SessionConfig {
        browser::local_get(CONFIG_STORAGE_KEY)
            .map(|raw| SessionConfig::merged_from_json(&raw))
            .unwrap_or_default()
    }

    pub fn save(config: &SessionConfig) {
        match serde_json::to_string(config) {
            Ok(json) => browser::local_set(CONFIG_STORAGE_KEY, &json),
            Err(err) => tracing::warn!(%err, "Could not serialize configuration."),
        }
    }

    pub fn clear() {
        browser::local_remove(CONFIG_STORAGE_KEY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assertr::prelude::*;

    fn complete_config() -> SessionConfig {
        SessionConfig {
            url: "https://auth.example.com".to_owned(),
            realm: "master".to_owned(),
            client_id: "my-client".to_owned(),
            disable_silent_sso: true,
        }
    }

    #[test]
    fn missing_fields_lists_every_empty_field() {
        let config = SessionConfig::default();
        assert_that(config.missing_fields())
            .is_equal_to(vec!["Keycloak URL", "realm", "client ID"]);
    }

    #[test]
    fn missing_fields_treats_whitespace_as_empty() {
        let config = SessionConfig {
            url: "https://auth.example.com".to_owned(),
            realm: "   ".to_owned(),
            client_id: "my-client".to_owned(),
            disable_silent_sso: false,
        };
        assert_that(config.missing_fields()).is_equal_to(vec!["realm"]);
    }

    #[test]
    fn missing_fields_is_empty_for_a_complete_config() {
        assert_that(complete_config().missing_fields()).has_length(0);
    }

    #[test]
    fn discovery_endpoint_extends_the_server_url() {
        let url = complete_config().discovery_endpoint().unwrap();
        assert_that(url.as_str()).is_equal_to(
            "https://auth.example.com/realms/master/.well-known/openid-configuration",
        );
    }

    #[test]
    fn discovery_endpoint_tolerates_a_trailing_slash() {
        let mut config = complete_config();
        config.url = "https://auth.example.com/".to_owned();
        let url = config.discovery_endpoint().unwrap();
        assert_that(url.as_str()).is_equal_to(
            "https://auth.example.com/realms/master/.well-known/openid-configuration",
        );
    }

    #[test]
    fn discovery_endpoint_rejects_a_non_url() {
        let mut config = complete_config();
        config.url = "not a url".to_owned();
        assert_that(config.discovery_endpoint().is_err()).is_true();
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = complete_config();
        let json = serde_json::to_string(&config).unwrap();
        assert_that(SessionConfig::merged_from_json(&json)).is_equal_to(config);
    }

    #[test]
    fn persisted_shape_uses_the_original_field_names() {
        let json = serde_json::to_string(&complete_config()).unwrap();
        assert_that(json.contains("\"clientId\"")).is_true();
        assert_that(json.contains("\"disableSilentSSO\"")).is_true();
    }

    #[test]
    fn malformed_json_yields_defaults() {
        assert_that(SessionConfig::merged_from_json("{not json"))
            .is_equal_to(SessionConfig::default());
        assert_that(SessionConfig::merged_from_json("[1, 2, 3]"))
            .is_equal_to(SessionConfig::default());
    }

    #[test]
    fn partial_json_merges_over_defaults() {
        let merged = SessionConfig::merged_from_json(r#"{"realm": "demo"}"#);
        assert_that(merged.realm.as_str()).is_equal_to("demo");
        assert_that(merged.url.as_str()).is_equal_to("");
        assert_that(merged.disable_silent_sso).is_false();
    }
}
