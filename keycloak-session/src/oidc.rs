use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt, Snafu};
use url::Url;

/// The subset of the OIDC discovery document this crate consumes.
/// See: <https://openid.net/specs/openid-connect-discovery-1_0.html#ProviderMetadata>
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct OidcConfig {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: Option<String>,

    /// RP-initiated logout endpoint. Keycloak always advertises one, but the
    /// claim is optional in the specification.
    pub end_session_endpoint: Option<String>,
}

#[derive(Debug, Clone, Snafu)]
pub enum MetadataError {
    #[snafu(display("MetadataError: Could not parse an advertised endpoint URL"))]
    Parsing { source: url::ParseError },

    #[snafu(display("MetadataError: The discovery document advertises no token endpoint"))]
    NoTokenEndpoint,
}

/// Endpoint URLs derived from the discovery document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Endpoints {
    pub authorization: Url,
    pub token: Url,
    pub end_session: Option<Url>,
}

impl Endpoints {
    pub(crate) fn try_from_config(config: &OidcConfig) -> Result<Self, MetadataError> {
        let authorization = Url::parse(&config.authorization_endpoint).context(ParsingSnafu)?;
        let token = config
            .token_endpoint
            .as_deref()
            .context(NoTokenEndpointSnafu)
            .and_then(|endpoint| Url::parse(endpoint).context(ParsingSnafu))?;
        let end_session = config
            .end_session_endpoint
            .as_deref()
            .map(|endpoint| Url::parse(endpoint).context(ParsingSnafu))
            .transpose()?;
        Ok(Self {
            authorization,
            token,
            end_session,
        })
    }
}
