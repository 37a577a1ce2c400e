//! Thin wrappers around the browser APIs this crate touches: location,
//! history and the per-origin key-value stores. Storage access is strictly
//! best-effort; failures (quota, denied access, missing window) are logged
//! and swallowed so that a broken storage layer never takes the tool down.

use url::Url;
use web_sys::Storage;

fn window() -> Option<web_sys::Window> {
    let window = web_sys::window();
    if window.is_none() {
        tracing::warn!("No browser window available.");
    }
    window
}

fn local_storage() -> Option<Storage> {
    window()?.local_storage().ok().flatten()
}

fn session_storage() -> Option<Storage> {
    window()?.session_storage().ok().flatten()
}

pub(crate) fn local_get(key: &str) -> Option<String> {
    local_storage()?.get_item(key).ok().flatten()
}

pub(crate) fn local_set(key: &str, value: &str) {
    if let Some(storage) = local_storage()
        && let Err(err) = storage.set_item(key, value)
    {
        tracing::warn!(?err, key, "Could not write to local storage.");
    }
}

pub(crate) fn local_remove(key: &str) {
    if let Some(storage) = local_storage()
        && let Err(err) = storage.remove_item(key)
    {
        tracing::warn!(?err, key, "Could not remove from local storage.");
    }
}

pub(crate) fn session_get(key: &str) -> Option<String> {
    session_storage()?.get_item(key).ok().flatten()
}

pub(crate) fn session_set(key: &str, value: &str) {
    if let Some(storage) = session_storage()
        && let Err(err) = storage.set_item(key, value)
    {
        tracing::warn!(?err, key, "Could not write to session storage.");
    }
}

pub(crate) fn session_remove(key: &str) {
    if let Some(storage) = session_storage()
        && let Err(err) = storage.remove_item(key)
    {
        tracing::warn!(?err, key, "Could not remove from session storage.");
    }
}

/// The current page origin (scheme, host, port) as a URL.
pub(crate) fn current_origin() -> Option<Url> {
    let origin = window()?.location().origin().ok()?;
    Url::parse(&origin).ok()
}

/// The full current URL, including query and fragment.
pub(crate) fn current_url() -> Option<Url> {
    let href = window()?.location().href().ok()?;
    Url::parse(&href).ok()
}

/// Whether the visible URL still carries authorization-response parameters
/// (in its query or fragment) from a completed or aborted redirect round
/// trip.
pub(crate) fn has_auth_response_params() -> bool {
    let Some(url) = current_url() else {
        return false;
    };
    let in_query = url
        .query_pairs()
        .any(|(key, _)| matches!(&*key, "state" | "code" | "error" | "session_state" | "iss"));
    let in_fragment = url
        .fragment()
        .map(|fragment| {
            url::form_urlencoded::parse(fragment.as_bytes())
                .any(|(key, _)| matches!(&*key, "state" | "code" | "error"))
        })
        .unwrap_or(false);
    in_query || in_fragment
}

/// Scrubs leftover authorization-response parameters from the visible URL by
/// replacing the current history entry with the clean path.
pub(crate) fn scrub_auth_params() {
    let Some(window) = window() else {
        return;
    };
    let Ok(pathname) = window.location().pathname() else {
        return;
    };
    match window.history() {
        Ok(history) => {
            if let Err(err) = history.replace_state_with_url(
                &wasm_bindgen::JsValue::NULL,
                "",
                Some(&pathname),
            ) {
                tracing::warn!(?err, "Could not scrub authorization parameters from the URL.");
            }
        }
        Err(err) => tracing::warn!(?err, "Browser history is not available."),
    }
}

/// Leaves the page. Control only comes back through a full reload at the
/// redirect target.
pub(crate) fn redirect(url: &Url) {
    let Some(window) = window() else {
        return;
    };
    if let Err(err) = window.location().assign(url.as_str()) {
        tracing::warn!(?err, "Could not navigate to {url}.");
    }
}
