//! Account registration page.

use leptos::prelude::*;
use leptos_router::NavigateOptions;
use leptos_router::hooks::use_navigate;

use crate::app::SessionHandle;
use crate::components::form::{FieldError, FormBanner};
use crate::components::guarded::Guarded;
use crate::net::error::FormFailure;
use crate::net::types::RegisterRequest;
use crate::util::guard::{LOGIN_PATH, ViewAccess};

#[component]
pub fn RegisterPage() -> impl IntoView {
    view! {
        <Guarded access=ViewAccess::Guest>
            <RegisterForm/>
        </Guarded>
    }
}

/// Registration does not sign in; success sends the user to the login page.
#[component]
fn RegisterForm() -> impl IntoView {
    let store = expect_context::<SessionHandle>();
    let navigate = use_navigate();
    let form = RwSignal::new(RegisterRequest::default());
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
        let request = form.get_untracked();
        let navigate = navigate.clone();
        leptos::task::spawn_local(async move {
            match session.register(&request).await {
                Ok(_) => navigate(LOGIN_PATH, NavigateOptions::default()),
                Err(err) => failure.set(err),
            }
            busy.set(false);
        });
    };

    view! {
        <div class="auth-page">
            <form class="auth-card" on:submit=on_submit>
                <h1>"Create account"</h1>
                <FormBanner failure/>
                <label class="form-field">
                    <span>"Username"</span>
                    <input
                        type="text"
                        autocomplete="username"
                        prop:value=move || form.with(|f| f.username.clone())
                        on:input=move |ev| form.update(|f| f.username = event_target_value(&ev))
                    />
                    <FieldError failure field="username"/>
                </label>
                <label class="form-field">
                    <span>"Email"</span>
                    <input
                        type="email"
                        autocomplete="email"
                        prop:value=move || form.with(|f| f.email.clone())
                        on:input=move |ev| form.update(|f| f.email = event_target_value(&ev))
                    />
                    <FieldError failure field="email"/>
                </label>
                <label class="form-field">
                    <span>"Password"</span>
                    <input
                        type="password"
                        autocomplete="new-password"
                        prop:value=move || form.with(|f| f.password.clone())
                        on:input=move |ev| form.update(|f| f.password = event_target_value(&ev))
                    />
                    <FieldError failure field="password"/>
                </label>
                <label class="form-field">
                    <span>"Confirm password"</span>
                    <input
                        type="password"
                        autocomplete="new-password"
                        prop:value=move || form.with(|f| f.password_confirm.clone())
                        on:input=move |ev| form.update(|f| f.password_confirm = event_target_value(&ev))
                    />
                    <FieldError failure field="password_confirm"/>
                </label>
                <button class="auth-button" type="submit" disabled=move || busy.get()>
                    {move || if busy.get() { "Creating account..." } else { "Register" }}
                </button>
                <p class="auth-card__alt">
                    "Already registered? "
                    <a href=LOGIN_PATH>"Sign in"</a>
                </p>
            </form>
        </div>
    }
}
