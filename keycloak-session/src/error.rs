use crate::oidc::MetadataError;
use crate::request::RequestError;
use snafu::Snafu;

/// An enumeration representing the errors a [`crate::SessionAdapter`]
/// operation can surface.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SessionError {
    #[snafu(display("SessionError: Missing required field(s): {fields}"))]
    IncompleteConfig { fields: String },

    #[snafu(display("SessionError: Invalid Keycloak server URL"))]
    InvalidServerUrl { source: url::ParseError },

    #[snafu(display("SessionError: The session adapter is not initialized"))]
    NotInitialized,

    #[snafu(display("SessionError: No authenticated session"))]
    NotAuthenticated,

    #[snafu(display("SessionError: Browser window is not available"))]
    NoBrowserContext,

    #[snafu(display("SessionError: Could not initialize the Keycloak client"))]
    Init { source: RequestError },

    #[snafu(display("SessionError: Provider metadata is unusable"))]
    Metadata { source: MetadataError },

    #[snafu(display("SessionError: The login callback could not be completed"))]
    Callback { source: RequestError },

    #[snafu(display("SessionError: Token refresh failed"))]
    Refresh { source: RequestError },
}
