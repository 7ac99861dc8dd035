//! Root application component with routing and context providers.

use leptos::prelude::*;
use leptos_meta::{MetaTags, Stylesheet, Title, provide_meta_context};
use leptos_router::{
    StaticSegment,
    components::{Redirect, Route, Router, Routes},
};

use crate::config::ClientConfig;
use crate::net::api::HttpApi;
use crate::pages::{chat::ChatPage, login::LoginPage, profile::ProfilePage, register::RegisterPage};
use crate::state::session::{SessionState, SessionStore};
use crate::util::guard::DEFAULT_PATH;
use crate::util::storage::LocalTokenStorage;

/// Session engine as wired in the browser.
pub type AppSession = SessionStore<HttpApi, LocalTokenStorage>;

/// Context handle for the session engine. Reactive views read
/// `RwSignal<SessionState>` instead; this is for issuing operations.
pub type SessionHandle = StoredValue<AppSession, LocalStorage>;

/// HTML shell rendered on the server for SSR + hydration.
pub fn shell(options: LeptosOptions) -> impl IntoView {
    view! {
        <!DOCTYPE html>
        <html lang="en">
            <head>
                <meta charset="utf-8"/>
                <meta name="viewport" content="width=device-width, initial-scale=1"/>
                <AutoReload options=options.clone()/>
                <HydrationScripts options/>
                <MetaTags/>
            </head>
            <body>
                <App/>
            </body>
        </html>
    }
}

/// Root application component.
///
/// Builds the session engine, mirrors it into a signal, starts the stored
/// token check, and sets up client-side routing.
#[component]
pub fn App() -> impl IntoView {
    provide_meta_context();

    let config = ClientConfig::from_document();
    let session = RwSignal::new(SessionState::default());
    let store = AppSession::new(HttpApi::new(&config), LocalTokenStorage::new(config.token_key.clone()));
    store.set_listener(move |state| session.set(state.clone()));

    #[cfg(feature = "hydrate")]
    {
        let store = store.clone();
        leptos::task::spawn_local(async move { store.initialize().await });
    }

    provide_context(config);
    provide_context(session);
    provide_context::<SessionHandle>(StoredValue::new_local(store));

    view! {
        <Stylesheet id="leptos" href="/pkg/chatroom.css"/>
        <Title text="Chatroom"/>

        <Router>
            <Routes fallback=|| "Page not found.".into_view()>
                <Route path=StaticSegment("") view=|| view! { <Redirect path=DEFAULT_PATH/> }/>
                <Route path=StaticSegment("login") view=LoginPage/>
                <Route path=StaticSegment("register") view=RegisterPage/>
                <Route path=StaticSegment("chat") view=ChatPage/>
                <Route path=StaticSegment("profile") view=ProfilePage/>
            </Routes>
        </Router>
    }
}
