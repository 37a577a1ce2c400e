use itertools::Itertools;
use std::borrow::Cow;
use url::Url;

/// Builds the URL of an authorization request against `authorization_endpoint`.
///
/// `prompt_none` turns the request into a non-interactive one: the provider
/// answers with `error=login_required` instead of rendering its login page
/// when no session exists. Used for the hidden-iframe silent check.
#[allow(clippy::too_many_arguments)]
pub(crate) fn authorization_url(
    authorization_endpoint: &Url,
    client_id: &str,
    redirect_uri: &Url,
    scope: &[String],
    code_challenge: &str,
    state: &str,
    prompt_none: bool,
) -> Url {
    let scope = match scope.len() {
        0 => Cow::Borrowed("openid"),
        _ => Cow::Owned(
            scope
                .iter()
                .map(|it| it.trim())
                .chain(["openid"])
                .join(" "),
        ),
    };

    let mut url = authorization_endpoint.clone();
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", redirect_uri.as_str())
        .append_pair("scope", &scope)
        .append_pair("state", state)
        .append_pair("code_challenge", code_challenge)
        .append_pair("code_challenge_method", "S256");
    if prompt_none {
        url.query_pairs_mut().append_pair("prompt", "none");
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use assertr::prelude::*;
    use std::collections::HashMap;

    fn query_map(url: &Url) -> HashMap<String, String> {
        url.query_pairs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn interactive_login_url_carries_the_code_flow_parameters() {
        let url = authorization_url(
            &Url::parse("https://auth.example.com/realms/master/protocol/openid-connect/auth")
                .unwrap(),
            "my-client",
            &Url::parse("http://127.0.0.1:3000").unwrap(),
            &[],
            "the-challenge",
            "the-state",
            false,
        );

        let query = query_map(&url);
        assert_that(query.get("response_type").cloned()).is_equal_to(Some("code".to_owned()));
        assert_that(query.get("client_id").cloned()).is_equal_to(Some("my-client".to_owned()));
        assert_that(query.get("scope").cloned()).is_equal_to(Some("openid".to_owned()));
        assert_that(query.get("code_challenge").cloned())
            .is_equal_to(Some("the-challenge".to_owned()));
        assert_that(query.get("code_challenge_method").cloned())
            .is_equal_to(Some("S256".to_owned()));
        assert_that(query.get("state").cloned()).is_equal_to(Some("the-state".to_owned()));
        assert_that(query.get("prompt").is_none()).is_true();
    }

    #[test]
    fn silent_check_url_requests_prompt_none() {
        let url = authorization_url(
            &Url::parse("https://auth.example.com/auth").unwrap(),
            "my-client",
            &Url::parse("http://127.0.0.1:3000/silent-check-sso.html").unwrap(),
            &[],
            "challenge",
            "state",
            true,
        );
        let query = query_map(&url);
        assert_that(query.get("prompt").cloned()).is_equal_to(Some("none".to_owned()));
    }

    #[test]
    fn additional_scopes_are_joined_with_openid() {
        let url = authorization_url(
            &Url::parse("https://auth.example.com/auth").unwrap(),
            "my-client",
            &Url::parse("http://127.0.0.1:3000").unwrap(),
            &["profile".to_owned(), " email ".to_owned()],
            "challenge",
            "state",
            false,
        );
        let query = query_map(&url);
        assert_that(query.get("scope").cloned())
            .is_equal_to(Some("profile email openid".to_owned()));
    }
}
