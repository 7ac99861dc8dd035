//! Shared chat room page.
//!
//! SYSTEM CONTEXT
//! ==============
//! The room is the authenticated landing route. Each mount builds its own
//! `MessageFeed`, starts polling, and tears it down on unmount so no request
//! issued by a previous mount can write into the view.

#[cfg(test)]
#[path = "chat_test.rs"]
mod chat_test;

use leptos::prelude::*;

use crate::app::SessionHandle;
use crate::components::guarded::Guarded;
use crate::config::ClientConfig;
use crate::net::api::HttpApi;
use crate::net::error::ErrorKind;
use crate::state::feed::{FeedEntry, FeedError, FeedView, MAX_MESSAGE_CHARS, MessageFeed, SendError};
use crate::state::session::SessionState;
use crate::util::guard::{PROFILE_PATH, ViewAccess};
use crate::util::time_fmt::{format_message_time, local_offset, now_utc};

#[component]
pub fn ChatPage() -> impl IntoView {
    view! {
        <Guarded access=ViewAccess::Protected>
            <ChatRoom/>
        </Guarded>
    }
}

#[component]
fn ChatRoom() -> impl IntoView {
    let session = expect_context::<RwSignal<SessionState>>();
    let store = expect_context::<SessionHandle>();
    let config = expect_context::<ClientConfig>();

    let view_state = RwSignal::new(FeedView::default());
    let draft = RwSignal::new(String::new());
    let notice = RwSignal::new(None::<String>);
    let sending = RwSignal::new(false);
    let dismissed = RwSignal::new(None::<FeedError>);
    let feed = StoredValue::new_local(None::<MessageFeed<HttpApi>>);

    let current = session.get_untracked();
    if let (Some(me), Some(token)) = (current.author(), current.token) {
        let engine = MessageFeed::new(store.with_value(|s| s.api().clone()), token, me, &config);
        engine.set_listener(move |snapshot| {
            if snapshot.error.is_none() && dismissed.with_untracked(Option::is_some) {
                dismissed.set(None);
            }
            view_state.set(snapshot.clone());
        });

        #[cfg(feature = "hydrate")]
        {
            let (mount, task) = engine.mount(gloo_timers::future::sleep);
            leptos::task::spawn_local(task);
            on_cleanup(move || drop(mount));
        }
        feed.set_value(Some(engine));
    }

    // A rejected token while polling ends the session; the guard redirects.
    Effect::new(move || {
        let auth_failed = view_state.with(|v| v.error.as_ref().is_some_and(|e| e.kind == ErrorKind::Auth));
        if auth_failed {
            store.with_value(|s| s.expire());
        }
    });

    let on_send = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();
        if sending.get_untracked() {
            return;
        }
        let Some(engine) = feed.get_value() else {
            return;
        };
        let text = draft.get_untracked();
        sending.set(true);
        notice.set(None);

        leptos::task::spawn_local(async move {
            match engine.send(&text).await {
                Ok(()) => draft.update(|d| clear_sent_draft(d, &text)),
                Err(SendError::TooLong { .. }) => {
                    notice.set(Some(format!("Messages are limited to {MAX_MESSAGE_CHARS} characters.")));
                }
                // Rejections surface through the feed error strip; the draft
                // stays for a retry.
                Err(SendError::Empty | SendError::Rejected(_) | SendError::Detached) => {}
            }
            sending.set(false);
        });
    };

    let on_logout = move |_| {
        let session = store.get_value();
        leptos::task::spawn_local(async move { session.logout().await });
    };

    let offset = local_offset();
    let rows = move || {
        let now = now_utc();
        view_state.with(|v| {
            v.messages
                .iter()
                .map(|entry| {
                    let own = feed.with_value(|f| f.as_ref().is_some_and(|f| f.is_own(entry)));
                    message_row(entry, own, format_message_time(entry.created_at, now, offset))
                })
                .collect::<Vec<_>>()
        })
    };

    view! {
        <div class="chat-page">
            <header class="chat-header">
                <h1>"Chat"</h1>
                <span class="chat-header__user">
                    {move || session.with(|s| s.user.as_ref().map(|u| u.username.clone()).unwrap_or_default())}
                </span>
                <a class="chat-header__link" href=PROFILE_PATH>"Profile"</a>
                <button class="chat-header__logout" on:click=on_logout>"Log out"</button>
            </header>

            {move || {
                let shown = view_state.with(|v| dismissed.with(|d| visible_error(v, d.as_ref()).cloned()));
                shown.map(|error| {
                    let message = error.message.clone();
                    view! {
                        <div class="chat-error" role="alert">
                            <span class="chat-error__message">{message}</span>
                            <button
                                class="chat-error__dismiss"
                                type="button"
                                aria-label="Dismiss"
                                on:click=move |_| dismissed.set(Some(error.clone()))
                            >
                                "×"
                            </button>
                        </div>
                    }
                })
            }}

            <Show
                when=move || !view_state.with(|v| v.loading && v.messages.is_empty())
                fallback=|| view! { <div class="chat-loading">"Loading messages..."</div> }
            >
                <Show
                    when=move || view_state.with(|v| !v.messages.is_empty())
                    fallback=|| view! { <div class="chat-empty">"No messages yet. Say hello!"</div> }
                >
                    <ul class="chat-messages">{rows}</ul>
                </Show>
            </Show>

            <form class="chat-composer" on:submit=on_send>
                <textarea
                    class="chat-composer__input"
                    placeholder="Write a message..."
                    prop:value=move || draft.get()
                    on:input=move |ev| draft.set(event_target_value(&ev))
                ></textarea>
                <button
                    class="chat-composer__send"
                    type="submit"
                    disabled=move || sending.get() || draft.with(|d| d.trim().is_empty())
                >
                    "Send"
                </button>
            </form>
            {move || notice.get().map(|message| view! { <p class="chat-composer__notice">{message}</p> })}
        </div>
    }
}

/// Error to show in the strip, unless the user dismissed that same error.
fn visible_error<'a>(view: &'a FeedView, dismissed: Option<&FeedError>) -> Option<&'a FeedError> {
    view.error.as_ref().filter(|error| dismissed != Some(*error))
}

/// Clear the composer after a send, keeping anything typed since.
fn clear_sent_draft(draft: &mut String, sent: &str) {
    if draft == sent {
        draft.clear();
    }
}

fn message_row(entry: &FeedEntry, own: bool, time: String) -> impl IntoView + use<> {
    let mut class = String::from("chat-message");
    if own {
        class.push_str(" chat-message--own");
    }
    if entry.is_pending() {
        class.push_str(" chat-message--pending");
    }
    let author = entry.author.username.clone();
    let text = entry.text.clone();

    view! {
        <li class=class>
            <span class="chat-message__author">{author}</span>
            <p class="chat-message__text">{text}</p>
            <time class="chat-message__time">{time}</time>
        </li>
    }
}
