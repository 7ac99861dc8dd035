//! Message feed state and its polling engine.
//!
//! SYSTEM CONTEXT
//! ==============
//! One `MessageFeed` exists per chat-view mount. It keeps a local projection
//! of the room eventually consistent with the backend while showing the
//! user's own sends immediately. It knows the session only through the token
//! and author it was created with; auth handling stays in `SessionStore`.
//!
//! DESIGN
//! ======
//! `FeedState` is the pure model: every transition is a plain method so the
//! ordering, dedup and reconciliation rules are testable without an executor.
//! `MessageFeed` wraps it with the network calls and the liveness flag.
//!
//! - Refresh responses carry the sequence number they were issued under; only
//!   the latest issued one is applied.
//! - Pending entries are matched to page messages by author, text, an id newer
//!   than the newest confirmed id at send time, and a creation time within the
//!   clock-skew tolerance.
//! - Ids confirmed by a send response are remembered until a page shows them,
//!   so a page snapshotted before the send cannot erase them.
//! - After teardown no response touches state.

#[cfg(test)]
#[path = "feed_test.rs"]
mod feed_test;

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration as StdDuration;

use thiserror::Error;
use time::{Duration, OffsetDateTime};

use crate::config::ClientConfig;
use crate::net::api::ChatApi;
use crate::net::error::{ApiError, ApiResult, ErrorKind};
use crate::net::types::{Author, ChatMessage, NewMessage, PageRequest};
use crate::util::poll::{PollHandle, poll_every};
use crate::util::time_fmt::now_utc;

pub const MAX_MESSAGE_CHARS: usize = 5000;

/// How far a server timestamp may lag a pending entry's local one and still
/// count as the same message.
const CLOCK_SKEW: Duration = Duration::seconds(60);

const LOAD_FAILED: &str = "Could not load messages.";
const SEND_FAILED: &str = "Message could not be sent.";
const SESSION_EXPIRED: &str = "Your session has expired. Please sign in again.";

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntryKey {
    Confirmed(i64),
    /// Feed-local id of an unconfirmed send.
    Pending(u64),
}

/// One row of the displayed feed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedEntry {
    pub key: EntryKey,
    pub author: Author,
    pub text: String,
    pub created_at: OffsetDateTime,
}

impl FeedEntry {
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self.key, EntryKey::Pending(_))
    }

    /// Server id, once confirmed.
    #[must_use]
    pub fn id(&self) -> Option<i64> {
        match self.key {
            EntryKey::Confirmed(id) => Some(id),
            EntryKey::Pending(_) => None,
        }
    }
}

impl From<&ChatMessage> for FeedEntry {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            key: EntryKey::Confirmed(msg.id),
            author: msg.author.clone(),
            text: msg.text.clone(),
            created_at: msg.created_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedError {
    pub kind: ErrorKind,
    pub message: String,
}

impl FeedError {
    fn from_refresh(err: &ApiError) -> Self {
        Self::describe(err, LOAD_FAILED)
    }

    fn from_send(err: &ApiError) -> Self {
        Self::describe(err, SEND_FAILED)
    }

    fn describe(err: &ApiError, fallback: &str) -> Self {
        let message = match err {
            ApiError::Validation(fields) => fields.first_message().unwrap_or(fallback),
            ApiError::Auth(_) => SESSION_EXPIRED,
            ApiError::Network(_) => fallback,
        };
        Self {
            kind: err.kind(),
            message: message.to_owned(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SendError {
    #[error("message is empty")]
    Empty,
    #[error("message is {len} characters; the limit is {max}", max = MAX_MESSAGE_CHARS)]
    TooLong { len: usize },
    #[error(transparent)]
    Rejected(#[from] ApiError),
    #[error("feed is no longer mounted")]
    Detached,
}

/// Snapshot handed to the view layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedView {
    /// Confirmed messages in display order, then pending sends in send order.
    pub messages: Vec<FeedEntry>,
    /// True until the first successful fetch.
    pub loading: bool,
    pub error: Option<FeedError>,
}

impl Default for FeedView {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            loading: true,
            error: None,
        }
    }
}

#[derive(Clone, Debug)]
struct PendingSend {
    local_id: u64,
    author: Author,
    text: String,
    created_at: OffsetDateTime,
    /// Newest confirmed id when the send started.
    baseline: Option<i64>,
}

impl PendingSend {
    fn matches(&self, msg: &ChatMessage) -> bool {
        msg.author.id == self.author.id
            && msg.text == self.text
            && self.baseline.is_none_or(|newest| msg.id > newest)
            && msg.created_at >= self.created_at - CLOCK_SKEW
    }

    fn entry(&self) -> FeedEntry {
        FeedEntry {
            key: EntryKey::Pending(self.local_id),
            author: self.author.clone(),
            text: self.text.clone(),
            created_at: self.created_at,
        }
    }
}

/// Pure feed model.
#[derive(Debug)]
pub struct FeedState {
    confirmed: Vec<ChatMessage>,
    pending: Vec<PendingSend>,
    loading: bool,
    error: Option<FeedError>,
    issued_seq: u64,
    next_local_id: u64,
    /// Ids placed by send responses, kept while they are displayed.
    sent_ids: BTreeSet<i64>,
}

impl Default for FeedState {
    fn default() -> Self {
        Self {
            confirmed: Vec::new(),
            pending: Vec::new(),
            loading: true,
            error: None,
            issued_seq: 0,
            next_local_id: 0,
            sent_ids: BTreeSet::new(),
        }
    }
}

impl FeedState {
    /// Issue the sequence number for a new refresh.
    pub fn begin_refresh(&mut self) -> u64 {
        self.issued_seq += 1;
        self.issued_seq
    }

    /// Apply a refresh response. Returns false when a newer refresh has been
    /// issued since `seq`, in which case nothing changes.
    pub fn apply_refresh(&mut self, seq: u64, result: ApiResult<Vec<ChatMessage>>) -> bool {
        if seq != self.issued_seq {
            return false;
        }
        match result {
            Ok(page) => {
                self.replace_confirmed(page);
                self.loading = false;
                self.error = None;
            }
            Err(err) => self.error = Some(FeedError::from_refresh(&err)),
        }
        true
    }

    /// Append a pending entry for `text`. Returns its local id.
    ///
    /// # Errors
    ///
    /// [`SendError::Empty`] or [`SendError::TooLong`]; the state is untouched.
    pub fn begin_send(&mut self, text: &str, author: Author, now: OffsetDateTime) -> Result<u64, SendError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SendError::Empty);
        }
        let len = text.chars().count();
        if len > MAX_MESSAGE_CHARS {
            return Err(SendError::TooLong { len });
        }

        self.next_local_id += 1;
        let local_id = self.next_local_id;
        self.pending.push(PendingSend {
            local_id,
            author,
            text: text.to_owned(),
            created_at: now,
            baseline: self.newest_confirmed_id(),
        });
        Ok(local_id)
    }

    /// Settle the pending entry `local_id` with the create response.
    pub fn complete_send(&mut self, local_id: u64, result: &ApiResult<ChatMessage>) {
        self.pending.retain(|p| p.local_id != local_id);
        match result {
            Ok(msg) => {
                if !self.confirmed.iter().any(|m| m.id == msg.id) {
                    self.confirmed.push(msg.clone());
                    sort_messages(&mut self.confirmed);
                }
                self.sent_ids.insert(msg.id);
                self.error = None;
            }
            Err(err) => self.error = Some(FeedError::from_send(err)),
        }
    }

    #[must_use]
    pub fn view(&self) -> FeedView {
        let messages = self
            .confirmed
            .iter()
            .map(FeedEntry::from)
            .chain(self.pending.iter().map(PendingSend::entry))
            .collect();
        FeedView {
            messages,
            loading: self.loading,
            error: self.error.clone(),
        }
    }

    fn newest_confirmed_id(&self) -> Option<i64> {
        self.confirmed.iter().map(|m| m.id).max()
    }

    fn replace_confirmed(&mut self, page: Vec<ChatMessage>) {
        let page_max = page.iter().map(|m| m.id).max();
        let mut by_id = BTreeMap::new();
        for msg in page {
            by_id.entry(msg.id).or_insert(msg);
        }

        // A page message settles at most one pending entry, and never one
        // whose own send response already claimed it.
        let mut claimed: BTreeSet<i64> = self.sent_ids.iter().copied().filter(|id| by_id.contains_key(id)).collect();
        self.pending.retain(|pending| {
            let hit = by_id
                .values()
                .find(|msg| !claimed.contains(&msg.id) && pending.matches(msg))
                .map(|msg| msg.id);
            match hit {
                Some(id) => {
                    claimed.insert(id);
                    false
                }
                None => true,
            }
        });

        for msg in std::mem::take(&mut self.confirmed) {
            let predates_page = page_max.is_none_or(|max| msg.id > max);
            if self.sent_ids.contains(&msg.id) && predates_page {
                by_id.entry(msg.id).or_insert(msg);
            }
        }
        self.sent_ids.retain(|id| by_id.contains_key(id));

        self.confirmed = by_id.into_values().collect();
        sort_messages(&mut self.confirmed);
    }
}

fn sort_messages(messages: &mut [ChatMessage]) {
    messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
}

type Listener = Box<dyn Fn(&FeedView)>;

struct FeedInner<A> {
    api: A,
    token: String,
    me: Author,
    page: PageRequest,
    interval: StdDuration,
    state: RefCell<FeedState>,
    alive: Arc<AtomicBool>,
    listener: RefCell<Option<Listener>>,
}

/// Feed engine for one chat-view mount. Clones share one feed.
pub struct MessageFeed<A> {
    inner: Rc<FeedInner<A>>,
}

impl<A> Clone for MessageFeed<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<A: ChatApi + 'static> MessageFeed<A> {
    #[must_use]
    pub fn new(api: A, token: impl Into<String>, me: Author, config: &ClientConfig) -> Self {
        Self {
            inner: Rc::new(FeedInner {
                api,
                token: token.into(),
                me,
                page: PageRequest {
                    limit: config.page_limit,
                    offset: 0,
                },
                interval: config.poll_interval(),
                state: RefCell::new(FeedState::default()),
                alive: Arc::new(AtomicBool::new(true)),
                listener: RefCell::new(None),
            }),
        }
    }

    pub fn set_listener(&self, listener: impl Fn(&FeedView) + 'static) {
        *self.inner.listener.borrow_mut() = Some(Box::new(listener));
    }

    #[must_use]
    pub fn view(&self) -> FeedView {
        self.inner.state.borrow().view()
    }

    /// True for entries written by the signed-in user.
    #[must_use]
    pub fn is_own(&self, entry: &FeedEntry) -> bool {
        entry.author.id == self.inner.me.id
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.inner.alive.load(Ordering::Relaxed)
    }

    /// Fetch the newest page and apply it unless superseded or torn down.
    pub async fn refresh(&self) {
        if !self.is_alive() {
            return;
        }
        let seq = self.inner.state.borrow_mut().begin_refresh();
        let result = self.inner.api.fetch_messages(&self.inner.token, self.inner.page).await;
        if !self.is_alive() {
            return;
        }
        if let Err(err) = &result {
            log::warn!("message refresh failed: {err}");
        }

        let applied = self.inner.state.borrow_mut().apply_refresh(seq, result);
        if applied {
            self.notify();
        } else {
            log::debug!("discarding superseded refresh #{seq}");
        }
    }

    /// Show `text` immediately, then confirm it with the backend.
    ///
    /// # Errors
    ///
    /// Local rejections leave the feed untouched. [`SendError::Rejected`]
    /// means the pending entry was removed and the caller should keep the
    /// draft. [`SendError::Detached`] means the feed was torn down.
    pub async fn send(&self, text: &str) -> Result<(), SendError> {
        if !self.is_alive() {
            return Err(SendError::Detached);
        }
        let local_id = self
            .inner
            .state
            .borrow_mut()
            .begin_send(text, self.inner.me.clone(), now_utc())?;
        self.notify();

        let req = NewMessage {
            text: text.trim().to_owned(),
        };
        let result = self.inner.api.create_message(&self.inner.token, &req).await;
        if !self.is_alive() {
            return Err(SendError::Detached);
        }

        self.inner.state.borrow_mut().complete_send(local_id, &result);
        self.notify();
        result.map(|_| ()).map_err(|err| {
            log::warn!("message send failed: {err}");
            SendError::Rejected(err)
        })
    }

    /// Start the refresh schedule: once now, then every poll interval.
    ///
    /// The returned future must be spawned on the local executor. Dropping or
    /// stopping the [`FeedMount`] tears the feed down.
    pub fn mount<S, SF>(&self, sleep: S) -> (FeedMount, impl Future<Output = ()> + use<A, S, SF>)
    where
        S: FnMut(StdDuration) -> SF,
        SF: Future<Output = ()>,
    {
        let feed = self.clone();
        let tick = move || {
            let feed = feed.clone();
            async move { feed.refresh().await }
        };
        let (poll, task) = poll_every(self.inner.interval, tick, sleep);
        let mount = FeedMount {
            poll,
            alive: Arc::clone(&self.inner.alive),
        };
        (mount, task)
    }

    /// Suppress every later state write from this feed.
    pub fn teardown(&self) {
        self.inner.alive.store(false, Ordering::Relaxed);
    }

    fn notify(&self) {
        let view = self.inner.state.borrow().view();
        if let Some(listener) = self.inner.listener.borrow().as_ref() {
            listener(&view);
        }
    }
}

/// Scoped lifetime of a mounted feed. `Send + Sync` so it can be released
/// from a reactive cleanup.
#[must_use = "dropping the mount tears the feed down"]
#[derive(Debug)]
pub struct FeedMount {
    poll: PollHandle,
    alive: Arc<AtomicBool>,
}

impl FeedMount {
    pub fn stop(&self) {
        self.alive.store(false, Ordering::Relaxed);
        self.poll.stop();
    }
}

impl Drop for FeedMount {
    fn drop(&mut self) {
        self.stop();
    }
}
