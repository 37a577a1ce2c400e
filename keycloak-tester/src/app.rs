use keycloak_session::{
    ConfigStore, SessionAdapter, SessionConfig, TokenClaims, TokenInfo, format_expires_in,
};
use leptos::leptos_dom::helpers::set_timeout;
use leptos::prelude::*;
use leptos::task::spawn_local;
use leptos_use::{UseClipboardReturn, UseIntervalReturn, use_clipboard, use_interval};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use time::OffsetDateTime;

/// How long a refresh success message stays on screen.
const NOTICE_DURATION: Duration = Duration::from_secs(3);

#[component]
pub fn App() -> impl IntoView {
    let config = RwSignal::new(ConfigStore::load());
    let tokens: RwSignal<Option<TokenInfo>> = RwSignal::new(None);
    let connected = RwSignal::new(false);
    let loading = RwSignal::new(false);
    let error: RwSignal<Option<String>> = RwSignal::new(None);
    let notice: RwSignal<Option<String>> = RwSignal::new(None);

    // The one live session adapter. Exclusively owned here; every handler
    // below goes through this single instance.
    let adapter = StoredValue::new_local(Rc::new(RefCell::new(SessionAdapter::new())));

    // Monotonic id of the currently displayed notice, so that a delayed
    // clear never wipes a newer message.
    let notice_seq = StoredValue::new(0u64);
    let show_notice = move |message: String| {
        let seq = notice_seq.with_value(|seq| seq + 1);
        notice_seq.set_value(seq);
        notice.set(Some(message));
        set_timeout(
            move || {
                if notice_seq.with_value(|current| *current == seq) {
                    notice.set(None);
                }
            },
            NOTICE_DURATION,
        );
    };

    // Persist the configuration on every change while disconnected. Once
    // connected the form is read-only anyway.
    Effect::new(move |_| {
        let current = config.get();
        if !connected.get_untracked() {
            ConfigStore::save(&current);
        }
    });

    // Wall clock driving the expiry countdowns. Only ticks while a token
    // set is on display.
    let UseIntervalReturn {
        counter,
        pause,
        resume,
        ..
    } = use_interval(1_000u64);
    let now = Memo::new(move |_| {
        counter.track();
        OffsetDateTime::now_utc()
    });
    Effect::new(move |_| {
        if tokens.read().is_some() {
            resume();
        } else {
            pause();
        }
    });

    // Passive check for an existing session (e.g. returning from a login
    // redirect). Must never surface an error banner; a failure just leaves
    // the tool disconnected.
    {
        let adapter = adapter.get_value();
        spawn_local(async move {
            let current = config.get_untracked();
            if !current.missing_fields().is_empty() {
                return;
            }
            loading.set(true);
            let mut guard = adapter.borrow_mut();
            let checked = guard.initialize(&current, current.disable_silent_sso).await;
            let authenticated = guard.is_authenticated();
            let info = guard.token_info();
            drop(guard);
            loading.set(false);
            match checked {
                Ok(()) if authenticated => {
                    tokens.set(info);
                    connected.set(true);
                }
                Ok(()) => {}
                Err(err) => {
                    tracing::warn!(%err, "Existing-session check failed. Staying disconnected.");
                }
            }
        });
    }

    let on_connect = move |_| {
        if loading.get_untracked() {
            return;
        }
        error.set(None);
        notice.set(None);

        let current = config.get_untracked();
        let missing = current.missing_fields();
        if !missing.is_empty() {
            error.set(Some(format!(
                "Missing required field(s): {}",
                missing.join(", ")
            )));
            return;
        }

        loading.set(true);
        let adapter = adapter.get_value();
        spawn_local(async move {
            let mut guard = adapter.borrow_mut();
            let outcome = match guard.initialize(&current, current.disable_silent_sso).await {
                Ok(()) if guard.is_authenticated() => Ok(guard.token_info()),
                // Leaves the page; the post-redirect check on the next load
                // resolves the eventual state.
                Ok(()) => guard.login().map(|()| None),
                Err(err) => Err(err),
            };
            drop(guard);
            match outcome {
                Ok(Some(info)) => {
                    ConfigStore::save(&current);
                    tokens.set(Some(info));
                    connected.set(true);
                    loading.set(false);
                }
                Ok(None) => { /* Redirect in progress. */ }
                Err(err) => {
                    loading.set(false);
                    error.set(Some(err.to_string()));
                }
            }
        });
    };

    let on_disconnect = move |_| {
        let adapter = adapter.get_value();
        if let Err(err) = adapter.borrow_mut().logout() {
            tracing::warn!(%err, "Logout failed. Clearing local state anyway.");
        }
        adapter.borrow_mut().clear();
        tokens.set(None);
        connected.set(false);
        error.set(None);
        notice.set(None);
    };

    let on_refresh = move |_| {
        if loading.get_untracked() {
            return;
        }
        error.set(None);
        loading.set(true);
        let adapter = adapter.get_value();
        spawn_local(async move {
            let mut guard = adapter.borrow_mut();
            let result = guard.refresh_token().await;
            let info = guard.token_info();
            drop(guard);
            loading.set(false);
            match result {
                Ok(outcome) => {
                    if let Some(info) = info {
                        tokens.set(Some(info));
                    }
                    show_notice(outcome.message);
                }
                Err(err) => {
                    notice.set(None);
                    error.set(Some(err.to_string()));
                }
            }
        });
    };

    let on_clear_config = move |_| {
        ConfigStore::clear();
        config.set(SessionConfig::default());
    };

    let can_connect = Memo::new(move |_| config.read().missing_fields().is_empty());
    let form_locked = Signal::derive(move || connected.get() || loading.get());

    let access_token = Signal::derive(move || {
        tokens
            .read()
            .as_ref()
            .map(|info| info.access_token.clone())
            .unwrap_or_default()
    });
    let refresh_token = Signal::derive(move || {
        tokens
            .read()
            .as_ref()
            .map(|info| info.refresh_token.clone())
            .unwrap_or_default()
    });
    let id_token = Signal::derive(move || {
        tokens
            .read()
            .as_ref()
            .map(|info| info.id_token.clone())
            .unwrap_or_default()
    });
    let access_claims = Signal::derive(move || {
        tokens
            .read()
            .as_ref()
            .map(|info| info.access_claims.clone())
            .unwrap_or_default()
    });
    let id_claims = Signal::derive(move || {
        tokens
            .read()
            .as_ref()
            .map(|info| info.id_claims.clone())
            .unwrap_or_default()
    });

    view! {
        <main>
            <header>
                <h1>"Keycloak Tester"</h1>
                <p>"Exercise your Keycloak configuration and inspect the issued tokens"</p>
            </header>

            <section class="card">
                <h2>"Keycloak configuration"</h2>

                <div class="field-grid">
                    <div>
                        <label for="kc-url">"Keycloak URL"</label>
                        <input
                            id="kc-url"
                            type="url"
                            placeholder="https://auth.example.com"
                            prop:value=move || config.read().url.clone()
                            prop:disabled=form_locked
                            on:input:target=move |ev| {
                                config.update(|c| c.url = ev.target().value())
                            }
                        />
                    </div>
                    <div>
                        <label for="kc-realm">"Realm"</label>
                        <input
                            id="kc-realm"
                            type="text"
                            placeholder="master"
                            prop:value=move || config.read().realm.clone()
                            prop:disabled=form_locked
                            on:input:target=move |ev| {
                                config.update(|c| c.realm = ev.target().value())
                            }
                        />
                    </div>
                    <div>
                        <label for="kc-client">"Client ID"</label>
                        <input
                            id="kc-client"
                            type="text"
                            placeholder="my-client"
                            prop:value=move || config.read().client_id.clone()
                            prop:disabled=form_locked
                            on:input:target=move |ev| {
                                config.update(|c| c.client_id = ev.target().value())
                            }
                        />
                    </div>
                </div>

                {move || {
                    error
                        .get()
                        .map(|message| view! { <div class="banner error">{message}</div> })
                }}
                {move || {
                    notice
                        .get()
                        .map(|message| view! { <div class="banner success">{message}</div> })
                }}

                <div class="checkbox-row">
                    <input
                        id="kc-no-silent-sso"
                        type="checkbox"
                        prop:checked=move || config.read().disable_silent_sso
                        prop:disabled=form_locked
                        on:change:target=move |ev| {
                            config.update(|c| c.disable_silent_sso = ev.target().checked())
                        }
                    />
                    <label for="kc-no-silent-sso">
                        "Disable silent SSO check (works around strict CSP setups)"
                    </label>
                </div>

                <div class="actions">
                    <Show
                        when=move || connected.get()
                        fallback=move || {
                            view! {
                                <button
                                    class="primary"
                                    prop:disabled=move || loading.get() || !can_connect.get()
                                    on:click=on_connect
                                >
                                    {move || if loading.get() { "Connecting..." } else { "Connect" }}
                                </button>
                                <button
                                    class="neutral"
                                    prop:disabled=move || loading.get()
                                    on:click=on_clear_config
                                >
                                    "Clear saved configuration"
                                </button>
                            }
                        }
                    >
                        <button class="danger" on:click=on_disconnect>
                            "Disconnect"
                        </button>
                        <button
                            class="neutral"
                            prop:disabled=move || loading.get()
                            on:click=on_refresh
                        >
                            "Refresh tokens"
                        </button>
                        <span class="connected-hint">"Connected"</span>
                    </Show>
                </div>
            </section>

            <Show when=move || tokens.read().is_some()>
                <UserCard claims=access_claims client_id=Signal::derive(move || config.read().client_id.clone())/>

                <TokenCard label="Access Token" value=access_token claims=access_claims now=Signal::from(now)/>
                <TokenCard label="Refresh Token" value=refresh_token/>
                <TokenCard label="ID Token" value=id_token claims=id_claims now=Signal::from(now)/>
            </Show>
        </main>
    }
}

/// Identity summary decoded from the access token.
#[component]
fn UserCard(
    #[prop(into)] claims: Signal<TokenClaims>,
    #[prop(into)] client_id: Signal<String>,
) -> impl IntoView {
    let display = |value: Option<String>| {
        value
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| "N/A".to_owned())
    };

    let realm_roles = Memo::new(move |_| claims.read().realm_roles());
    let client_roles = Memo::new(move |_| claims.read().client_roles(&client_id.read()));

    view! {
        <section class="card">
            <h2>"User information"</h2>
            <div class="user-grid">
                <div>
                    <div class="label">"Name"</div>
                    <p class="value">{move || display(claims.read().name.clone())}</p>
                </div>
                <div>
                    <div class="label">"Email"</div>
                    <p class="value">{move || display(claims.read().email.clone())}</p>
                </div>
                <div>
                    <div class="label">"Username"</div>
                    <p class="value">{move || display(claims.read().preferred_username.clone())}</p>
                </div>
                <div>
                    <div class="label">"User ID"</div>
                    <p class="value">{move || display(Some(claims.read().sub.clone()))}</p>
                </div>
                <div>
                    <div class="label">"Realm roles"</div>
                    <div>
                        {move || {
                            realm_roles
                                .get()
                                .into_iter()
                                .map(|role| view! { <span class="badge">{role}</span> })
                                .collect_view()
                        }}
                    </div>
                </div>
                <Show when=move || !client_roles.read().is_empty()>
                    <div>
                        <div class="label">"Client roles"</div>
                        <div>
                            {move || {
                                client_roles
                                    .get()
                                    .into_iter()
                                    .map(|role| view! { <span class="badge">{role}</span> })
                                    .collect_view()
                            }}
                        </div>
                    </div>
                </Show>
            </div>
        </section>
    }
}

/// One raw token with a copy action and, for JWT-format tokens, the decoded
/// claim set and a live expiry countdown.
#[component]
fn TokenCard(
    label: &'static str,
    #[prop(into)] value: Signal<String>,
    #[prop(into, optional)] claims: Option<Signal<TokenClaims>>,
    #[prop(into, optional)] now: Option<Signal<OffsetDateTime>>,
) -> impl IntoView {
    let UseClipboardReturn { copy, copied, .. } = use_clipboard();

    let expiry = match (claims, now) {
        (Some(claims), Some(now)) => Some(Signal::derive(move || {
            format_expires_in(claims.read().exp, now.get())
        })),
        _ => None,
    };
    let decoded = claims.map(|claims| Signal::derive(move || claims.read().to_pretty_json()));

    view! {
        <section class="card">
            <div class="token-head">
                <h3>{label}</h3>
                <div class="actions">
                    {expiry.map(|expiry| {
                        view! { <span class="expiry">{move || expiry.get()}</span> }
                    })}
                    <button
                        class="neutral"
                        on:click={
                            let copy = copy.clone();
                            move |_| copy(&value.get_untracked())
                        }
                    >
                        {move || if copied.get() { "Copied" } else { "Copy" }}
                    </button>
                </div>
            </div>

            <div class="token-value">{move || value.get()}</div>

            {decoded.map(|decoded| {
                view! {
                    <pre class="claims">{move || decoded.get()}</pre>
                }
            })}
        </section>
    }
}
