use url::Url;

/// Builds the RP-initiated logout URL. The provider destroys its session and
/// redirects back to `post_logout_redirect`. The ID token hint lets the
/// provider skip its logout confirmation screen.
pub(crate) fn end_session_url(
    end_session_endpoint: &Url,
    post_logout_redirect: &Url,
    client_id: &str,
    id_token_hint: Option<&str>,
) -> Url {
    let mut url = end_session_endpoint.clone();
    url.query_pairs_mut()
        .append_pair("post_logout_redirect_uri", post_logout_redirect.as_str())
        .append_pair("client_id", client_id);
    if let Some(hint) = id_token_hint {
        url.query_pairs_mut().append_pair("id_token_hint", hint);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use assertr::prelude::*;

    #[test]
    fn logout_url_carries_redirect_and_hint() {
        let url = end_session_url(
            &Url::parse("https://auth.example.com/realms/master/protocol/openid-connect/logout")
                .unwrap(),
            &Url::parse("http://127.0.0.1:3000").unwrap(),
            "my-client",
            Some("the-id-token"),
        );
        let query: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_that(query.contains(&(
            "post_logout_redirect_uri".to_owned(),
            "http://127.0.0.1:3000/".to_owned(),
        )))
        .is_true();
        assert_that(query.contains(&("id_token_hint".to_owned(), "the-id-token".to_owned())))
            .is_true();
        assert_that(query.contains(&("client_id".to_owned(), "my-client".to_owned()))).is_true();
    }

    #[test]
    fn hint_is_omitted_when_no_id_token_is_known() {
        let url = end_session_url(
            &Url::parse("https://auth.example.com/logout").unwrap(),
            &Url::parse("http://127.0.0.1:3000").unwrap(),
            "my-client",
            None,
        );
        assert_that(url.query().unwrap_or_default().contains("id_token_hint")).is_false();
    }
}
