//! Hidden-iframe silent SSO check.
//!
//! A non-interactive authorization request (`prompt=none`) is loaded into an
//! invisible iframe whose redirect target is the dedicated same-origin
//! `silent-check-sso.html` page. That page posts its final URL back to us via
//! `postMessage`; the URL either carries an authorization code (an existing
//! provider session) or a `login_required`-style error (no session).

use crate::login;
use crate::pkce::CodeVerifier;
use crate::response::AuthCallback;
use futures::StreamExt;
use futures::channel::mpsc;
use url::Url;
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use web_sys::{HtmlIFrameElement, MessageEvent};

/// How long to wait for the iframe round trip before concluding that no
/// answer is coming (slow provider, blocked framing, broken page).
const SILENT_CHECK_TIMEOUT_MS: i32 = 10_000;

/// Performs the silent check. Resolves to the authorization response posted
/// by the check page, or `None` on timeout or when the browser environment
/// is unusable. Never fails hard: a silent check is always best-effort.
pub(crate) async fn check(
    authorization_endpoint: &Url,
    client_id: &str,
    silent_redirect_uri: &Url,
    verifier: &CodeVerifier,
    state: &str,
) -> Option<AuthCallback> {
    let window = web_sys::window()?;
    let document = window.document()?;
    let body = document.body()?;
    let origin = window.location().origin().ok()?;

    let check_url = login::authorization_url(
        authorization_endpoint,
        client_id,
        silent_redirect_uri,
        &[],
        &verifier.challenge(),
        state,
        true,
    );

    let (tx, mut rx) = mpsc::unbounded::<Option<String>>();

    // The check page posts `location.href` back to us. Only accept messages
    // from our own origin carrying a string payload.
    let on_message = {
        let tx = tx.clone();
        let origin = origin.clone();
        Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
            if event.origin() != origin {
                return;
            }
            if let Some(href) = event.data().as_string() {
                let _ = tx.unbounded_send(Some(href));
            }
        })
    };
    let on_timeout = Closure::<dyn FnMut()>::new(move || {
        let _ = tx.unbounded_send(None);
    });

    if let Err(err) = window
        .add_event_listener_with_callback("message", on_message.as_ref().unchecked_ref())
    {
        tracing::warn!(?err, "Could not listen for the silent check response.");
        return None;
    }
    let timeout_handle = window
        .set_timeout_with_callback_and_timeout_and_arguments_0(
            on_timeout.as_ref().unchecked_ref(),
            SILENT_CHECK_TIMEOUT_MS,
        )
        .ok();

    let iframe: HtmlIFrameElement = document
        .create_element("iframe")
        .ok()?
        .dyn_into()
        .ok()?;
    iframe.set_src(check_url.as_str());
    iframe.set_title("keycloak silent sso check");
    let _ = iframe.style().set_property("display", "none");
    if let Err(err) = body.append_child(&iframe) {
        tracing::warn!(?err, "Could not attach the silent check iframe.");
        let _ = window
            .remove_event_listener_with_callback("message", on_message.as_ref().unchecked_ref());
        return None;
    }

    let answer = rx.next().await.flatten();

    let _ = window
        .remove_event_listener_with_callback("message", on_message.as_ref().unchecked_ref());
    if let Some(handle) = timeout_handle {
        window.clear_timeout_with_handle(handle);
    }
    let _ = body.remove_child(&iframe);
    drop(on_message);
    drop(on_timeout);

    match answer {
        Some(href) => match Url::parse(&href) {
            Ok(url) => AuthCallback::from_url(&url),
            Err(err) => {
                tracing::warn!(%err, "Silent check page posted an unparsable URL.");
                None
            }
        },
        None => {
            tracing::debug!("Silent check timed out. Assuming no existing session.");
            None
        }
    }
}
