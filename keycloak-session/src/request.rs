use crate::oidc::OidcConfig;
use crate::pkce::CodeVerifier;
use crate::response::{ErrorResponse, SuccessTokenResponse, TokenResponse};
use reqwest::IntoUrl;
use snafu::{ResultExt, Snafu};

#[derive(Debug, Snafu)]
pub enum RequestError {
    #[snafu(display("RequestError: Could not send request"))]
    Send { source: reqwest::Error },

    #[snafu(display("RequestError: Could not decode payload"))]
    Decode { source: reqwest::Error },

    #[snafu(display("RequestError: {error_response}"))]
    ErrResponse { error_response: ErrorResponse },
}

pub(crate) async fn retrieve_oidc_config(
    discovery_endpoint: impl IntoUrl,
) -> Result<OidcConfig, RequestError> {
    reqwest::Client::new()
        .get(discovery_endpoint)
        .send()
        .await
        .context(SendSnafu {})?
        .json::<OidcConfig>()
        .await
        .context(DecodeSnafu {})
}

pub(crate) async fn exchange_code_for_token(
    token_endpoint: impl IntoUrl,
    client_id: &str,
    redirect_uri: &str,
    code: &str,
    code_verifier: &CodeVerifier,
    session_state: Option<&str>,
) -> Result<SuccessTokenResponse, RequestError> {
    let mut params = vec![
        ("grant_type", "authorization_code"),
        ("client_id", client_id),
        ("redirect_uri", redirect_uri),
        ("code", code),
        ("code_verifier", code_verifier.secret()),
    ];
    if let Some(session_state) = session_state {
        params.push(("state", session_state));
    }
    request_token(token_endpoint, &params).await
}

pub(crate) async fn refresh_token(
    token_endpoint: impl IntoUrl,
    client_id: &str,
    refresh_token: &str,
) -> Result<SuccessTokenResponse, RequestError> {
    let params = [
        ("grant_type", "refresh_token"),
        ("client_id", client_id),
        ("refresh_token", refresh_token),
    ];
    request_token(token_endpoint, &params).await
}

async fn request_token(
    token_endpoint: impl IntoUrl,
    params: &[(&str, &str)],
) -> Result<SuccessTokenResponse, RequestError> {
    match reqwest::Client::new()
        .post(token_endpoint)
        .form(params)
        .send()
        .await
        .context(SendSnafu {})?
        .json::<TokenResponse>()
        .await
        .context(DecodeSnafu {})?
    {
        TokenResponse::Success(success) => Ok(success),
        TokenResponse::Error(error_response) => Err(ErrResponseSnafu { error_response }.build()),
    }
}
