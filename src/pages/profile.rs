//! Profile page: account details and username/email editing.

use leptos::prelude::*;

use crate::app::SessionHandle;
use crate::components::form::{FieldError, FormBanner};
use crate::components::guarded::Guarded;
use crate::net::error::FormFailure;
use crate::net::types::ProfileUpdate;
use crate::state::session::SessionState;
use crate::util::guard::{DEFAULT_PATH, ViewAccess};
use crate::util::time_fmt::{format_member_since, local_offset};

#[component]
pub fn ProfilePage() -> impl IntoView {
    view! {
        <Guarded access=ViewAccess::Protected>
            <ProfileCard/>
        </Guarded>
    }
}

#[component]
fn ProfileCard() -> impl IntoView {
    let session = expect_context::<RwSignal<SessionState>>();
    let store = expect_context::<SessionHandle>();

    let editing = RwSignal::new(false);
    let form = RwSignal::new(ProfileUpdate::default());
    let failure = RwSignal::new(FormFailure::default());
    let saved = RwSignal::new(false);
    let busy = RwSignal::new(false);

    // Pick up changes made elsewhere since sign-in.
    #[cfg(feature = "hydrate")]
    {
        let session = store.get_value();
        leptos::task::spawn_local(async move {
            if let Err(err) = session.refresh_profile().await {
                log::warn!("profile refresh failed: {err}");
            }
        });
    }

    let start_edit = move |_| {
        if let Some(user) = session.with_untracked(|s| s.user.clone()) {
            form.set(ProfileUpdate {
                username: user.username,
                email: user.email,
            });
        }
        failure.set(FormFailure::default());
        saved.set(false);
        editing.set(true);
    };

    let on_save = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();
        if busy.get_untracked() {
            return;
        }
        busy.set(true);
        failure.set(FormFailure::default());

        let session = store.get_value();
        let update = form.get_untracked();
        leptos::task::spawn_local(async move {
            match session.update_profile(&update).await {
                Ok(_) => {
                    editing.set(false);
                    saved.set(true);
                }
                Err(err) => failure.set(err),
            }
            busy.set(false);
        });
    };

    let on_logout = move |_| {
        let session = store.get_value();
        leptos::task::spawn_local(async move { session.logout().await });
    };

    let offset = local_offset();

    view! {
        <div class="profile-page">
            <div class="profile-card">
                <h1>"Profile"</h1>
                <Show when=move || saved.get()>
                    <div class="form-banner form-banner--ok">"Profile updated."</div>
                </Show>
                <Show
                    when=move || editing.get()
                    fallback=move || {
                        view! {
                            <dl class="profile-card__details">
                                <dt>"Username"</dt>
                                <dd>{move || session.with(|s| s.user.as_ref().map(|u| u.username.clone())).unwrap_or_default()}</dd>
                                <dt>"Email"</dt>
                                <dd>{move || session.with(|s| s.user.as_ref().map(|u| u.email.clone())).unwrap_or_default()}</dd>
                                <dt>"Member since"</dt>
                                <dd>
                                    {move || {
                                        session
                                            .with(|s| s.user.as_ref().map(|u| format_member_since(u.created_at, offset)))
                                            .unwrap_or_default()
                                    }}
                                </dd>
                            </dl>
                            <button class="profile-card__edit" on:click=start_edit>"Edit"</button>
                        }
                    }
                >
                    <form class="profile-form" on:submit=on_save>
                        <FormBanner failure/>
                        <label class="form-field">
                            <span>"Username"</span>
                            <input
                                type="text"
                                prop:value=move || form.with(|f| f.username.clone())
                                on:input=move |ev| form.update(|f| f.username = event_target_value(&ev))
                            />
                            <FieldError failure field="username"/>
                        </label>
                        <label class="form-field">
                            <span>"Email"</span>
                            <input
                                type="email"
                                prop:value=move || form.with(|f| f.email.clone())
                                on:input=move |ev| form.update(|f| f.email = event_target_value(&ev))
                            />
                            <FieldError failure field="email"/>
                        </label>
                        <button type="submit" disabled=move || busy.get()>"Save"</button>
                        <button type="button" on:click=move |_| editing.set(false)>"Cancel"</button>
                    </form>
                </Show>
                <nav class="profile-card__nav">
                    <a href=DEFAULT_PATH>"Back to chat"</a>
                    <button on:click=on_logout>"Log out"</button>
                </nav>
            </div>
        </div>
    }
}
