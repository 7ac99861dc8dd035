//! Auth-session state and its lifecycle engine.
//!
//! SYSTEM CONTEXT
//! ==============
//! `SessionStore` is created once in `App`, initialized on load, and consulted
//! by route guards on every navigation. It is the only writer of the persisted
//! token. Views observe it through a mirrored `RwSignal<SessionState>`.
//!
//! DESIGN
//! ======
//! Status machine: `Uninitialized -> Checking -> Authenticated | Anonymous`.
//! `Authenticated` falls back to `Anonymous` only through `logout` or a failed
//! auth check (`initialize` rejection or `expire`). Every operation that starts
//! an auth check bumps a generation counter; a check that resolves after a
//! newer operation started is ignored.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::net::api::ChatApi;
use crate::net::error::{ApiError, ApiResult, FieldErrors, FormFailure};
use crate::net::types::{Author, LoginRequest, ProfileUpdate, RegisterRequest, User};
use crate::util::storage::TokenStorage;
use crate::util::validate;

const LOGIN_FALLBACK: &str = "Invalid username or password.";
const REGISTER_FALLBACK: &str = "Registration failed. Please try again.";
const PROFILE_FALLBACK: &str = "Could not update the profile.";
const SIGNED_OUT: &str = "You are not signed in.";
const INTERRUPTED: &str = "Sign-in was interrupted. Please try again.";

/// Where the session is in its lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionStatus {
    /// `initialize` has not run yet.
    #[default]
    Uninitialized,
    /// A persisted token is being validated against the backend.
    Checking,
    Authenticated,
    Anonymous,
}

/// Snapshot of the current session.
///
/// `user` is present exactly when `status` is `Authenticated`. `token` is also
/// present while `Checking`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionState {
    pub status: SessionStatus,
    pub token: Option<String>,
    pub user: Option<User>,
}

impl SessionState {
    fn anonymous() -> Self {
        Self {
            status: SessionStatus::Anonymous,
            token: None,
            user: None,
        }
    }

    fn checking(token: String) -> Self {
        Self {
            status: SessionStatus::Checking,
            token: Some(token),
            user: None,
        }
    }

    fn authenticated(token: String, user: User) -> Self {
        Self {
            status: SessionStatus::Authenticated,
            token: Some(token),
            user: Some(user),
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }

    /// Identity used to attribute and style the user's own messages.
    #[must_use]
    pub fn author(&self) -> Option<Author> {
        self.user.as_ref().map(User::author)
    }
}

type Listener = Box<dyn Fn(&SessionState)>;

struct SessionInner<A, S> {
    api: A,
    storage: S,
    state: RefCell<SessionState>,
    generation: Cell<u64>,
    /// Bumped by every profile write; reads issued before it are stale.
    profile_seq: Cell<u64>,
    listener: RefCell<Option<Listener>>,
}

/// Owner of the session token and profile. Clones share one session.
pub struct SessionStore<A, S> {
    inner: Rc<SessionInner<A, S>>,
}

impl<A, S> Clone for SessionStore<A, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<A: ChatApi, S: TokenStorage> SessionStore<A, S> {
    #[must_use]
    pub fn new(api: A, storage: S) -> Self {
        Self {
            inner: Rc::new(SessionInner {
                api,
                storage,
                state: RefCell::new(SessionState::default()),
                generation: Cell::new(0),
                profile_seq: Cell::new(0),
                listener: RefCell::new(None),
            }),
        }
    }

    /// Backend handle, shared with per-view engines such as the message feed.
    #[must_use]
    pub fn api(&self) -> &A {
        &self.inner.api
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.inner.state.borrow().status
    }

    /// Register the observer notified after every state change.
    pub fn set_listener(&self, listener: impl Fn(&SessionState) + 'static) {
        *self.inner.listener.borrow_mut() = Some(Box::new(listener));
    }

    /// Validate the persisted token, if any.
    ///
    /// Safe to call again: each call re-runs the check and supersedes any
    /// check still in flight.
    pub async fn initialize(&self) {
        let generation = self.next_generation();
        let Some(token) = self.inner.storage.load().filter(|t| !t.is_empty()) else {
            self.set(SessionState::anonymous());
            return;
        };

        self.set(SessionState::checking(token.clone()));
        let result = self.inner.api.fetch_profile(&token).await;
        if generation != self.inner.generation.get() {
            log::debug!("discarding superseded auth check");
            return;
        }

        match result {
            Ok(user) => self.set(SessionState::authenticated(token, user)),
            Err(err) => {
                log::warn!("stored session rejected: {err}");
                self.inner.storage.clear();
                self.set(SessionState::anonymous());
            }
        }
    }

    /// Exchange credentials for a session.
    ///
    /// # Errors
    ///
    /// Returns a [`FormFailure`] with field errors or a displayable message
    /// when validation or the backend rejects the attempt. The session is
    /// anonymous afterwards.
    pub async fn login(&self, username: &str, password: &str) -> Result<User, FormFailure> {
        let fields = validate::login(username, password);
        if !fields.is_empty() {
            return Err(FormFailure::from_fields(fields, LOGIN_FALLBACK));
        }

        let generation = self.next_generation();
        let req = LoginRequest {
            username: username.trim().to_owned(),
            password: password.to_owned(),
        };
        let result = self.inner.api.login(&req).await;
        if generation != self.inner.generation.get() {
            log::debug!("discarding superseded login response");
            return Err(FormFailure::from_fields(FieldErrors::new(), INTERRUPTED));
        }

        match result {
            Ok(resp) => {
                self.inner.storage.store(&resp.token);
                self.set(SessionState::authenticated(resp.token, resp.user.clone()));
                Ok(resp.user)
            }
            Err(err) => {
                log_form_error("login", &err);
                self.inner.storage.clear();
                self.set(SessionState::anonymous());
                Err(FormFailure::from_api(&err, LOGIN_FALLBACK))
            }
        }
    }

    /// Create an account. Does not sign in; the caller sends the user to the
    /// login entry point on success.
    ///
    /// # Errors
    ///
    /// Returns a [`FormFailure`] when local validation or the backend rejects
    /// the form.
    pub async fn register(&self, form: &RegisterRequest) -> Result<User, FormFailure> {
        let fields = validate::registration(form);
        if !fields.is_empty() {
            return Err(FormFailure::from_fields(fields, REGISTER_FALLBACK));
        }

        let req = RegisterRequest {
            username: form.username.trim().to_owned(),
            email: form.email.trim().to_owned(),
            ..form.clone()
        };
        match self.inner.api.register(&req).await {
            Ok(resp) => {
                log::debug!("registered account {}", resp.user.username);
                Ok(resp.user)
            }
            Err(err) => {
                log_form_error("registration", &err);
                Err(FormFailure::from_api(&err, REGISTER_FALLBACK))
            }
        }
    }

    /// End the session locally, then tell the backend on a best-effort basis.
    ///
    /// Local termination happens first and cannot be blocked by the network.
    pub async fn logout(&self) {
        self.next_generation();
        let token = self.inner.state.borrow().token.clone();
        self.inner.storage.clear();
        self.set(SessionState::anonymous());

        if let Some(token) = token {
            if let Err(err) = self.inner.api.logout(&token).await {
                log::warn!("logout request failed: {err}");
            }
        }
    }

    /// Failed auth check outside `initialize`, e.g. a 401 while polling.
    pub fn expire(&self) {
        if self.status() == SessionStatus::Anonymous {
            return;
        }
        self.next_generation();
        log::warn!("session expired");
        self.inner.storage.clear();
        self.set(SessionState::anonymous());
    }

    /// Re-fetch the current profile. An auth rejection expires the session.
    ///
    /// # Errors
    ///
    /// Returns the [`ApiError`] from the backend, or [`ApiError::Auth`] when
    /// there is no authenticated session.
    pub async fn refresh_profile(&self) -> ApiResult<User> {
        let (token, generation) = self.authenticated_token().ok_or_else(|| ApiError::Auth(SIGNED_OUT.to_owned()))?;
        let seq = self.inner.profile_seq.get();
        let result = self.inner.api.fetch_profile(&token).await;
        self.absorb_profile(&token, generation, seq, &result);
        result
    }

    /// Update username and email.
    ///
    /// # Errors
    ///
    /// Returns a [`FormFailure`] when validation or the backend rejects the
    /// update, or when no session is active.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, FormFailure> {
        let Some((token, generation)) = self.authenticated_token() else {
            return Err(FormFailure::from_fields(FieldErrors::new(), SIGNED_OUT));
        };
        let fields = validate::profile(update);
        if !fields.is_empty() {
            return Err(FormFailure::from_fields(fields, PROFILE_FALLBACK));
        }

        let req = ProfileUpdate {
            username: update.username.trim().to_owned(),
            email: update.email.trim().to_owned(),
        };
        let seq = self.inner.profile_seq.get() + 1;
        self.inner.profile_seq.set(seq);
        let result = self.inner.api.update_profile(&token, &req).await;
        self.absorb_profile(&token, generation, seq, &result);
        result.map_err(|err| {
            log_form_error("profile update", &err);
            FormFailure::from_api(&err, PROFILE_FALLBACK)
        })
    }

    fn authenticated_token(&self) -> Option<(String, u64)> {
        let state = self.inner.state.borrow();
        if state.status != SessionStatus::Authenticated {
            return None;
        }
        state.token.clone().map(|t| (t, self.inner.generation.get()))
    }

    /// Apply a profile response if the session it was issued under is still
    /// current. A user snapshot is taken only when no profile write was
    /// issued after it; an auth rejection expires regardless.
    fn absorb_profile(&self, token: &str, generation: u64, seq: u64, result: &ApiResult<User>) {
        if generation != self.inner.generation.get() {
            return;
        }
        match result {
            Ok(user) if seq == self.inner.profile_seq.get() => {
                self.set(SessionState::authenticated(token.to_owned(), user.clone()));
            }
            Ok(_) => log::debug!("discarding superseded profile snapshot"),
            Err(ApiError::Auth(_)) => self.expire(),
            Err(_) => {}
        }
    }

    fn next_generation(&self) -> u64 {
        let next = self.inner.generation.get() + 1;
        self.inner.generation.set(next);
        next
    }

    fn set(&self, next: SessionState) {
        let previous = self.inner.state.replace(next.clone());
        if previous.status != next.status {
            log::debug!("session {:?} -> {:?}", previous.status, next.status);
        }
        if let Some(listener) = self.inner.listener.borrow().as_ref() {
            listener(&next);
        }
    }
}

fn log_form_error(operation: &str, err: &ApiError) {
    match err {
        ApiError::Validation(_) => log::debug!("{operation} rejected: {err}"),
        ApiError::Auth(_) | ApiError::Network(_) => log::warn!("{operation} failed: {err}"),
    }
}
