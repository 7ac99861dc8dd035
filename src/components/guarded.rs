//! Route wrapper applying the session guard.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every routed page renders its content through `Guarded` so protected and
//! guest views share one redirect and loading behavior.

use leptos::prelude::*;
use leptos_router::hooks::use_navigate;

use crate::state::session::SessionState;
use crate::util::guard::{GuardDecision, ViewAccess, decide, install_guard_redirect};

/// Renders `children` only while the guard allows the view; shows a neutral
/// placeholder while the session is unresolved and redirects otherwise.
#[component]
pub fn Guarded(access: ViewAccess, children: ChildrenFn) -> impl IntoView {
    let session = expect_context::<RwSignal<SessionState>>();
    install_guard_redirect(session, access, use_navigate());

    let decision = Memo::new(move |_| decide(access, session.get().status));

    view! {
        <Show
            when=move || decision.get() == GuardDecision::Render
            fallback=|| view! { <div class="guard-loading">"Loading..."</div> }
        >
            {children()}
        </Show>
    }
}
