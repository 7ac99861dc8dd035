//! Username + password sign-in page.

use leptos::prelude::*;

use crate::app::SessionHandle;
use crate::components::form::{FieldError, FormBanner};
use crate::components::guarded::Guarded;
use crate::net::error::FormFailure;
use crate::util::guard::{REGISTER_PATH, ViewAccess};

#[component]
pub fn LoginPage() -> impl IntoView {
    view! {
        <Guarded access=ViewAccess::Guest>
            <LoginForm/>
        </Guarded>
    }
}

/// On success the session turns authenticated and the guest guard moves the
/// user on; the form only reports failures.
#[component]
fn LoginForm() -> impl IntoView {
    let store = expect_context::<SessionHandle>();
    let username = RwSignal::new(String::new());
    let password = RwSignal::new(String::new());
    let failure = RwSignal::new(FormFailure::default());
    let busy = RwSignal::new(false);

    let on_submit = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();
        if busy.get_untracked() {
            return;
        }
        busy.set(true);
        failure.set(FormFailure::default());

        let session = store.get_value();
        let (username_value, password_value) = (username.get_untracked(), password.get_untracked());
        leptos::task::spawn_local(async move {
            if let Err(err) = session.login(&username_value, &password_value).await {
                failure.set(err);
            }
            busy.set(false);
        });
    };

    view! {
        <div class="auth-page">
            <form class="auth-card" on:submit=on_submit>
                <h1>"Sign in"</h1>
                <FormBanner failure/>
                <label class="form-field">
                    <span>"Username"</span>
                    <input
                        type="text"
                        autocomplete="username"
                        prop:value=move || username.get()
                        on:input=move |ev| username.set(event_target_value(&ev))
                    />
                    <FieldError failure field="username"/>
                </label>
                <label class="form-field">
                    <span>"Password"</span>
                    <input
                        type="password"
                        autocomplete="current-password"
                        prop:value=move || password.get()
                        on:input=move |ev| password.set(event_target_value(&ev))
                    />
                    <FieldError failure field="password"/>
                </label>
                <button class="auth-button" type="submit" disabled=move || busy.get()>
                    {move || if busy.get() { "Signing in..." } else { "Sign in" }}
                </button>
                <p class="auth-card__alt">
                    "No account yet? "
                    <a href=REGISTER_PATH>"Register"</a>
                </p>
            </form>
        </div>
    }
}
