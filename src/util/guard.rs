//! Route access decisions.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every routed view declares whether it needs a session or must only be seen
//! without one. Decisions depend solely on `SessionStatus`; token and user are
//! never consulted directly.

#[cfg(test)]
#[path = "guard_test.rs"]
mod guard_test;

use leptos::prelude::*;
use leptos_router::NavigateOptions;

use crate::state::session::{SessionState, SessionStatus};

pub const LOGIN_PATH: &str = "/login";
pub const REGISTER_PATH: &str = "/register";
pub const DEFAULT_PATH: &str = "/chat";
pub const PROFILE_PATH: &str = "/profile";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewAccess {
    /// Requires an authenticated session.
    Protected,
    /// Login and registration; pointless once signed in.
    Guest,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuardDecision {
    Render,
    /// Session not yet resolved; show a neutral placeholder.
    Loading,
    Redirect(&'static str),
}

/// Whether a protected view may render.
#[must_use]
pub fn allow(status: SessionStatus) -> bool {
    status == SessionStatus::Authenticated
}

#[must_use]
pub fn decide(access: ViewAccess, status: SessionStatus) -> GuardDecision {
    match (access, status) {
        (_, SessionStatus::Uninitialized | SessionStatus::Checking) => GuardDecision::Loading,
        (ViewAccess::Protected, SessionStatus::Anonymous) => GuardDecision::Redirect(LOGIN_PATH),
        (ViewAccess::Guest, SessionStatus::Authenticated) => GuardDecision::Redirect(DEFAULT_PATH),
        (ViewAccess::Protected, SessionStatus::Authenticated) | (ViewAccess::Guest, SessionStatus::Anonymous) => {
            GuardDecision::Render
        }
    }
}

/// Navigate away whenever the session status rules the view out.
pub fn install_guard_redirect<F>(session: RwSignal<SessionState>, access: ViewAccess, navigate: F)
where
    F: Fn(&str, NavigateOptions) + Clone + 'static,
{
    Effect::new(move || {
        if let GuardDecision::Redirect(path) = decide(access, session.get().status) {
            log::debug!("guard redirect to {path}");
            navigate(
                path,
                NavigateOptions {
                    replace: true,
                    ..NavigateOptions::default()
                },
            );
        }
    });
}
