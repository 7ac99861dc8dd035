//! Scripted backend and fixtures shared by engine tests.

use std::cell::RefCell;
use std::collections::VecDeque;

use async_trait::async_trait;
use futures::channel::oneshot;
use time::OffsetDateTime;
use time::macros::datetime;

use crate::net::api::ChatApi;
use crate::net::error::{ApiError, ApiResult};
use crate::net::types::{
    AuthResponse, Author, ChatMessage, LoginRequest, NewMessage, PageRequest, ProfileUpdate, RegisterRequest, User,
};

/// Reference instant all fixtures are relative to.
pub(crate) const EPOCH: OffsetDateTime = datetime!(2024-05-01 12:00 UTC);

pub(crate) fn user(id: i64, username: &str) -> User {
    User {
        id,
        username: username.to_owned(),
        email: format!("{username}@example.com"),
        created_at: EPOCH,
    }
}

pub(crate) fn author(id: i64, username: &str) -> Author {
    Author {
        id,
        username: username.to_owned(),
    }
}

/// Message `id` by `author`, created `secs` seconds after [`EPOCH`].
pub(crate) fn message(id: i64, author: &Author, text: &str, secs: i64) -> ChatMessage {
    ChatMessage {
        id,
        author: author.clone(),
        text: text.to_owned(),
        created_at: EPOCH + time::Duration::seconds(secs),
    }
}

pub(crate) fn network_error() -> ApiError {
    ApiError::Network("connection reset".to_owned())
}

pub(crate) fn auth_error() -> ApiError {
    ApiError::Auth("Invalid token".to_owned())
}

/// One scripted reply: available now, or released later by the test.
enum Reply<T> {
    Now(ApiResult<T>),
    Later(oneshot::Receiver<ApiResult<T>>),
}

impl<T> Reply<T> {
    async fn resolve(self) -> ApiResult<T> {
        match self {
            Self::Now(result) => result,
            Self::Later(rx) => rx
                .await
                .unwrap_or_else(|_| Err(ApiError::Network("reply dropped".to_owned()))),
        }
    }
}

struct Script<T> {
    replies: RefCell<VecDeque<Reply<T>>>,
}

impl<T> Default for Script<T> {
    fn default() -> Self {
        Self {
            replies: RefCell::new(VecDeque::new()),
        }
    }
}

impl<T> Script<T> {
    fn push(&self, result: ApiResult<T>) {
        self.replies.borrow_mut().push_back(Reply::Now(result));
    }

    fn defer(&self) -> oneshot::Sender<ApiResult<T>> {
        let (tx, rx) = oneshot::channel();
        self.replies.borrow_mut().push_back(Reply::Later(rx));
        tx
    }

    async fn next(&self) -> ApiResult<T> {
        let reply = self.replies.borrow_mut().pop_front();
        match reply {
            Some(reply) => reply.resolve().await,
            None => Err(ApiError::Network("unscripted call".to_owned())),
        }
    }
}

/// [`ChatApi`] double answering from per-endpoint reply queues and
/// recording every call it receives.
#[derive(Default)]
pub(crate) struct ScriptedApi {
    registers: Script<AuthResponse>,
    logins: Script<AuthResponse>,
    logouts: Script<()>,
    profiles: Script<User>,
    profile_updates: Script<User>,
    pages: Script<Vec<ChatMessage>>,
    creates: Script<ChatMessage>,
    calls: RefCell<Vec<String>>,
}

impl ScriptedApi {
    pub(crate) fn push_register(&self, result: ApiResult<AuthResponse>) {
        self.registers.push(result);
    }

    pub(crate) fn push_login(&self, result: ApiResult<AuthResponse>) {
        self.logins.push(result);
    }

    pub(crate) fn push_logout(&self, result: ApiResult<()>) {
        self.logouts.push(result);
    }

    pub(crate) fn defer_logout(&self) -> oneshot::Sender<ApiResult<()>> {
        self.logouts.defer()
    }

    pub(crate) fn push_profile(&self, result: ApiResult<User>) {
        self.profiles.push(result);
    }

    pub(crate) fn defer_profile(&self) -> oneshot::Sender<ApiResult<User>> {
        self.profiles.defer()
    }

    pub(crate) fn push_profile_update(&self, result: ApiResult<User>) {
        self.profile_updates.push(result);
    }

    pub(crate) fn push_page(&self, result: ApiResult<Vec<ChatMessage>>) {
        self.pages.push(result);
    }

    pub(crate) fn defer_page(&self) -> oneshot::Sender<ApiResult<Vec<ChatMessage>>> {
        self.pages.defer()
    }

    pub(crate) fn push_create(&self, result: ApiResult<ChatMessage>) {
        self.creates.push(result);
    }

    pub(crate) fn defer_create(&self) -> oneshot::Sender<ApiResult<ChatMessage>> {
        self.creates.defer()
    }

    /// Number of calls made to `endpoint` (the trait method name).
    pub(crate) fn calls(&self, endpoint: &str) -> usize {
        self.calls.borrow().iter().filter(|c| c.as_str() == endpoint).count()
    }

    /// Token sent with the most recent authenticated call.
    pub(crate) fn last_token(&self) -> Option<String> {
        self.calls
            .borrow()
            .iter()
            .rev()
            .find_map(|c| c.strip_prefix("token:").map(str::to_owned))
    }

    fn record(&self, endpoint: &str, token: Option<&str>) {
        let mut calls = self.calls.borrow_mut();
        calls.push(endpoint.to_owned());
        if let Some(token) = token {
            calls.push(format!("token:{token}"));
        }
    }
}

#[async_trait(?Send)]
impl ChatApi for ScriptedApi {
    async fn register(&self, _req: &RegisterRequest) -> ApiResult<AuthResponse> {
        self.record("register", None);
        self.registers.next().await
    }

    async fn login(&self, _req: &LoginRequest) -> ApiResult<AuthResponse> {
        self.record("login", None);
        self.logins.next().await
    }

    async fn logout(&self, token: &str) -> ApiResult<()> {
        self.record("logout", Some(token));
        self.logouts.next().await
    }

    async fn fetch_profile(&self, token: &str) -> ApiResult<User> {
        self.record("fetch_profile", Some(token));
        self.profiles.next().await
    }

    async fn update_profile(&self, token: &str, _update: &ProfileUpdate) -> ApiResult<User> {
        self.record("update_profile", Some(token));
        self.profile_updates.next().await
    }

    async fn fetch_messages(&self, token: &str, _page: PageRequest) -> ApiResult<Vec<ChatMessage>> {
        self.record("fetch_messages", Some(token));
        self.pages.next().await
    }

    async fn create_message(&self, token: &str, _message: &NewMessage) -> ApiResult<ChatMessage> {
        self.record("create_message", Some(token));
        self.creates.next().await
    }
}
