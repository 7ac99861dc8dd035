use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::FutureExt;
use futures::channel::oneshot;
use futures::executor::{LocalPool, block_on};
use futures::future::LocalBoxFuture;
use futures::task::LocalSpawnExt;

use super::*;
use crate::test_helpers::{EPOCH, ScriptedApi, auth_error, author, message, network_error};

fn at(secs: i64) -> OffsetDateTime {
    EPOCH + Duration::seconds(secs)
}

fn ids(view: &FeedView) -> Vec<Option<i64>> {
    view.messages.iter().map(FeedEntry::id).collect()
}

fn texts(view: &FeedView) -> Vec<&str> {
    view.messages.iter().map(|e| e.text.as_str()).collect()
}

fn assert_sorted(view: &FeedView) {
    let confirmed: Vec<_> = view.messages.iter().filter(|e| !e.is_pending()).collect();
    for pair in confirmed.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        assert!(
            (a.created_at, a.id()) < (b.created_at, b.id()),
            "{:?} must sort before {:?}",
            a.key,
            b.key
        );
    }
}

fn refreshed(state: &mut FeedState, page: Vec<ChatMessage>) {
    let seq = state.begin_refresh();
    assert!(state.apply_refresh(seq, Ok(page)));
}

// =============================================================
// FeedState: refresh
// =============================================================

#[test]
fn starts_loading_and_empty() {
    let view = FeedState::default().view();
    assert!(view.loading);
    assert!(view.messages.is_empty());
    assert_eq!(view.error, None);
}

#[test]
fn refresh_orders_by_time_then_id_and_dedupes() {
    let bob = author(2, "bob");
    let mut state = FeedState::default();
    refreshed(
        &mut state,
        vec![
            message(3, &bob, "third", 30),
            message(2, &bob, "second", 10),
            message(1, &bob, "first", 10),
            message(2, &bob, "second", 10),
        ],
    );

    let view = state.view();
    assert_eq!(ids(&view), vec![Some(1), Some(2), Some(3)]);
    assert!(!view.loading);
    assert_sorted(&view);
}

#[test]
fn list_stays_sorted_across_arbitrary_refreshes() {
    let bob = author(2, "bob");
    let pages = [
        vec![message(5, &bob, "e", 50), message(1, &bob, "a", 10)],
        vec![message(9, &bob, "i", 5), message(7, &bob, "g", 5), message(8, &bob, "h", 90)],
        vec![],
        vec![message(4, &bob, "d", 40), message(4, &bob, "d", 40), message(2, &bob, "b", 20)],
    ];
    let mut state = FeedState::default();
    for page in pages {
        refreshed(&mut state, page);
        assert_sorted(&state.view());
    }
}

#[test]
fn refresh_failure_keeps_list_and_never_reasserts_loading() {
    let bob = author(2, "bob");
    let mut state = FeedState::default();
    refreshed(&mut state, vec![message(1, &bob, "hi", 0)]);

    let seq = state.begin_refresh();
    assert!(state.apply_refresh(seq, Err(network_error())));
    let view = state.view();
    assert_eq!(ids(&view), vec![Some(1)]);
    assert!(!view.loading);
    let error = view.error.expect("error should be set");
    assert_eq!(error.kind, ErrorKind::Network);
    assert_eq!(error.message, LOAD_FAILED);

    refreshed(&mut state, vec![message(1, &bob, "hi", 0), message(2, &bob, "again", 5)]);
    let view = state.view();
    assert_eq!(view.error, None);
    assert_eq!(ids(&view), vec![Some(1), Some(2)]);
}

#[test]
fn failure_before_first_success_keeps_loading() {
    let mut state = FeedState::default();
    let seq = state.begin_refresh();
    state.apply_refresh(seq, Err(network_error()));
    let view = state.view();
    assert!(view.loading);
    assert!(view.error.is_some());
}

#[test]
fn stale_refresh_is_discarded() {
    let bob = author(2, "bob");
    let mut state = FeedState::default();
    let first = state.begin_refresh();
    let second = state.begin_refresh();

    assert!(state.apply_refresh(second, Ok(vec![message(2, &bob, "newer", 20)])));
    assert!(!state.apply_refresh(first, Ok(vec![message(1, &bob, "older", 10)])));
    assert_eq!(ids(&state.view()), vec![Some(2)]);

    // A stale failure does not set an error either.
    let third = state.begin_refresh();
    let fourth = state.begin_refresh();
    assert!(state.apply_refresh(fourth, Ok(vec![message(2, &bob, "newer", 20)])));
    assert!(!state.apply_refresh(third, Err(network_error())));
    assert_eq!(state.view().error, None);
}

#[test]
fn auth_failure_surfaces_auth_kind() {
    let mut state = FeedState::default();
    let seq = state.begin_refresh();
    state.apply_refresh(seq, Err(auth_error()));
    let error = state.view().error.expect("error should be set");
    assert_eq!(error.kind, ErrorKind::Auth);
    assert_eq!(error.message, SESSION_EXPIRED);
}

// =============================================================
// FeedState: sends and reconciliation
// =============================================================

#[test]
fn blank_send_is_rejected_without_state_change() {
    let mut state = FeedState::default();
    let before = state.view();
    assert!(matches!(state.begin_send("", author(1, "ann"), at(0)), Err(SendError::Empty)));
    assert!(matches!(state.begin_send("  \n\t", author(1, "ann"), at(0)), Err(SendError::Empty)));
    assert_eq!(state.view(), before);
}

#[test]
fn overlong_send_is_rejected() {
    let mut state = FeedState::default();
    let text = "x".repeat(MAX_MESSAGE_CHARS + 1);
    assert!(matches!(
        state.begin_send(&text, author(1, "ann"), at(0)),
        Err(SendError::TooLong { len }) if len == MAX_MESSAGE_CHARS + 1
    ));
    assert!(state.view().messages.is_empty());

    let exact = "x".repeat(MAX_MESSAGE_CHARS);
    assert!(state.begin_send(&exact, author(1, "ann"), at(0)).is_ok());
}

#[test]
fn send_is_visible_as_pending_immediately() {
    let mut state = FeedState::default();
    state.begin_send("  hello ", author(1, "ann"), at(0)).expect("send");
    let view = state.view();
    let last = view.messages.last().expect("entry");
    assert!(last.is_pending());
    assert_eq!(last.text, "hello");
}

#[test]
fn pending_stays_after_confirmed_until_matched() {
    let ann = author(1, "ann");
    let bob = author(2, "bob");
    let mut state = FeedState::default();
    state.begin_send("mine", ann, at(100)).expect("send");
    refreshed(&mut state, vec![message(1, &bob, "theirs", 200)]);

    let view = state.view();
    assert_eq!(texts(&view), vec!["theirs", "mine"]);
    assert!(view.messages[1].is_pending());
}

#[test]
fn send_success_replaces_pending_with_server_message() {
    let ann = author(1, "ann");
    let mut state = FeedState::default();
    let local = state.begin_send("x", ann.clone(), at(0)).expect("send");
    state.complete_send(local, &Ok(message(42, &ann, "x", 1)));

    let view = state.view();
    assert_eq!(ids(&view), vec![Some(42)]);
    assert!(view.messages.iter().all(|e| !e.is_pending()));
}

#[test]
fn confirmed_send_then_refresh_shows_one_entry() {
    let ann = author(1, "ann");
    let mut state = FeedState::default();
    let local = state.begin_send("x", ann.clone(), at(0)).expect("send");
    state.complete_send(local, &Ok(message(42, &ann, "x", 1)));
    refreshed(&mut state, vec![message(42, &ann, "x", 1)]);

    assert_eq!(ids(&state.view()), vec![Some(42)]);
}

#[test]
fn refresh_matching_pending_before_send_resolves_shows_one_entry() {
    let ann = author(1, "ann");
    let mut state = FeedState::default();
    refreshed(&mut state, vec![message(5, &ann, "x", 0)]);

    let local = state.begin_send("x", ann.clone(), at(100)).expect("send");
    refreshed(&mut state, vec![message(5, &ann, "x", 0), message(6, &ann, "x", 101)]);
    assert_eq!(ids(&state.view()), vec![Some(5), Some(6)]);

    state.complete_send(local, &Ok(message(6, &ann, "x", 101)));
    assert_eq!(ids(&state.view()), vec![Some(5), Some(6)]);
}

#[test]
fn pending_ignores_messages_older_than_send_baseline() {
    let ann = author(1, "ann");
    let mut state = FeedState::default();
    refreshed(&mut state, vec![message(5, &ann, "x", 99)]);
    state.begin_send("x", ann.clone(), at(100)).expect("send");

    refreshed(&mut state, vec![message(5, &ann, "x", 99)]);
    let view = state.view();
    assert_eq!(ids(&view), vec![Some(5), None]);
}

#[test]
fn pending_ignores_messages_outside_clock_skew() {
    let ann = author(1, "ann");
    let mut state = FeedState::default();
    state.begin_send("x", ann.clone(), at(100)).expect("send");

    refreshed(&mut state, vec![message(7, &ann, "x", 39)]);
    assert_eq!(ids(&state.view()), vec![Some(7), None]);
}

#[test]
fn pending_ignores_other_authors_and_texts() {
    let ann = author(1, "ann");
    let bob = author(2, "bob");
    let mut state = FeedState::default();
    state.begin_send("x", ann.clone(), at(100)).expect("send");

    refreshed(&mut state, vec![message(7, &bob, "x", 100), message(8, &ann, "y", 100)]);
    assert_eq!(ids(&state.view()), vec![Some(7), Some(8), None]);
}

#[test]
fn one_page_message_settles_one_pending_entry() {
    let ann = author(1, "ann");
    let mut state = FeedState::default();
    state.begin_send("x", ann.clone(), at(100)).expect("send");
    state.begin_send("x", ann.clone(), at(100)).expect("send");

    refreshed(&mut state, vec![message(9, &ann, "x", 100)]);
    let view = state.view();
    assert_eq!(ids(&view), vec![Some(9), None]);
}

#[test]
fn send_confirmed_id_is_not_reused_for_another_pending() {
    let ann = author(1, "ann");
    let mut state = FeedState::default();
    let first = state.begin_send("x", ann.clone(), at(100)).expect("send");
    state.begin_send("x", ann.clone(), at(100)).expect("send");
    state.complete_send(first, &Ok(message(9, &ann, "x", 100)));

    refreshed(&mut state, vec![message(9, &ann, "x", 100)]);
    let view = state.view();
    assert_eq!(ids(&view), vec![Some(9), None]);
}

#[test]
fn failed_send_is_removed_and_never_reappears() {
    let ann = author(1, "ann");
    let bob = author(2, "bob");
    let mut state = FeedState::default();
    let local = state.begin_send("lost", ann, at(0)).expect("send");
    state.complete_send(local, &Err(network_error()));

    let view = state.view();
    assert!(view.messages.is_empty());
    let error = view.error.expect("error should be set");
    assert_eq!(error.message, SEND_FAILED);

    refreshed(&mut state, vec![message(1, &bob, "other", 5)]);
    assert_eq!(texts(&state.view()), vec!["other"]);
}

#[test]
fn send_validation_error_uses_server_message() {
    let ann = author(1, "ann");
    let mut state = FeedState::default();
    let local = state.begin_send("x", ann, at(0)).expect("send");
    let err = ApiError::from_status(400, &serde_json::json!({ "text": ["Message is too long."] }));
    state.complete_send(local, &Err(err));

    let error = state.view().error.expect("error should be set");
    assert_eq!(error.kind, ErrorKind::Validation);
    assert_eq!(error.message, "Message is too long.");
}

#[test]
fn confirmed_send_survives_page_snapshotted_before_it() {
    let ann = author(1, "ann");
    let bob = author(2, "bob");
    let mut state = FeedState::default();
    let local = state.begin_send("x", ann.clone(), at(60)).expect("send");
    state.complete_send(local, &Ok(message(42, &ann, "x", 60)));

    refreshed(&mut state, vec![message(41, &bob, "earlier", 30)]);
    assert_eq!(ids(&state.view()), vec![Some(41), Some(42)]);

    // Once a page newer than the send omits it, it is gone server-side.
    refreshed(&mut state, vec![message(41, &bob, "earlier", 30), message(50, &bob, "later", 90)]);
    assert_eq!(ids(&state.view()), vec![Some(41), Some(50)]);
}

#[test]
fn send_success_clears_error() {
    let ann = author(1, "ann");
    let mut state = FeedState::default();
    let seq = state.begin_refresh();
    state.apply_refresh(seq, Err(network_error()));

    let local = state.begin_send("x", ann.clone(), at(0)).expect("send");
    state.complete_send(local, &Ok(message(1, &ann, "x", 0)));
    assert_eq!(state.view().error, None);
}

// =============================================================
// MessageFeed engine
// =============================================================

fn feed_with(api: &Rc<ScriptedApi>) -> MessageFeed<Rc<ScriptedApi>> {
    MessageFeed::new(Rc::clone(api), "tok", author(1, "ann"), &ClientConfig::default())
}

#[test]
fn refresh_uses_feed_token() {
    let api = Rc::new(ScriptedApi::default());
    let feed = feed_with(&api);
    api.push_page(Ok(vec![message(1, &author(2, "bob"), "hi", 0)]));
    block_on(feed.refresh());

    assert_eq!(api.last_token().as_deref(), Some("tok"));
    assert_eq!(ids(&feed.view()), vec![Some(1)]);
    assert!(!feed.view().loading);
}

#[test]
fn empty_send_issues_no_request() {
    let api = Rc::new(ScriptedApi::default());
    let feed = feed_with(&api);
    let before = feed.view();

    assert!(matches!(block_on(feed.send("")), Err(SendError::Empty)));
    assert_eq!(api.calls("create_message"), 0);
    assert_eq!(feed.view(), before);
}

#[test]
fn send_shows_pending_before_response_arrives() {
    let api = Rc::new(ScriptedApi::default());
    let feed = feed_with(&api);
    let reply = api.defer_create();
    let outcome: Rc<RefCell<Option<Result<(), SendError>>>> = Rc::default();

    let mut pool = LocalPool::new();
    let task_feed = feed.clone();
    let task_outcome = Rc::clone(&outcome);
    pool.spawner()
        .spawn_local(async move {
            let result = task_feed.send("hello").await;
            *task_outcome.borrow_mut() = Some(result);
        })
        .expect("spawn");
    pool.run_until_stalled();

    let view = feed.view();
    assert_eq!(texts(&view), vec!["hello"]);
    assert!(view.messages[0].is_pending());
    assert!(outcome.borrow().is_none());

    reply.send(Ok(message(42, &author(1, "ann"), "hello", 0))).expect("reply");
    pool.run_until_stalled();
    assert_eq!(ids(&feed.view()), vec![Some(42)]);
    assert!(matches!(outcome.borrow().as_ref(), Some(Ok(()))));
}

#[test]
fn failed_send_reports_rejection_and_clears_pending() {
    let api = Rc::new(ScriptedApi::default());
    let feed = feed_with(&api);
    api.push_create(Err(network_error()));

    let result = block_on(feed.send("hello"));
    assert!(matches!(result, Err(SendError::Rejected(ApiError::Network(_)))));
    let view = feed.view();
    assert!(view.messages.is_empty());
    assert!(view.error.is_some());

    api.push_page(Ok(Vec::new()));
    block_on(feed.refresh());
    assert!(feed.view().messages.is_empty());
}

#[test]
fn sent_message_then_page_with_same_id_is_not_duplicated() {
    let api = Rc::new(ScriptedApi::default());
    let feed = feed_with(&api);
    let ann = author(1, "ann");
    api.push_create(Ok(message(42, &ann, "x", 0)));
    block_on(feed.send("x")).expect("send");

    api.push_page(Ok(vec![message(42, &ann, "x", 0)]));
    block_on(feed.refresh());
    assert_eq!(ids(&feed.view()), vec![Some(42)]);
}

#[test]
fn out_of_order_responses_apply_only_latest_refresh() {
    let api = Rc::new(ScriptedApi::default());
    let feed = feed_with(&api);
    let bob = author(2, "bob");
    let first = api.defer_page();
    let second = api.defer_page();

    let mut pool = LocalPool::new();
    for _ in 0..2 {
        let task_feed = feed.clone();
        pool.spawner()
            .spawn_local(async move { task_feed.refresh().await })
            .expect("spawn");
    }
    pool.run_until_stalled();

    second.send(Ok(vec![message(2, &bob, "newer", 20)])).expect("reply");
    pool.run_until_stalled();
    first.send(Ok(vec![message(1, &bob, "older", 10)])).expect("reply");
    pool.run_until_stalled();

    assert_eq!(ids(&feed.view()), vec![Some(2)]);
}

#[test]
fn listener_receives_each_applied_change() {
    let api = Rc::new(ScriptedApi::default());
    let feed = feed_with(&api);
    let seen = Rc::new(Cell::new(0));
    let counter = Rc::clone(&seen);
    feed.set_listener(move |_| counter.set(counter.get() + 1));

    api.push_page(Ok(Vec::new()));
    block_on(feed.refresh());
    api.push_create(Ok(message(1, &author(1, "ann"), "x", 0)));
    block_on(feed.send("x")).expect("send");

    // refresh, pending append, send completion
    assert_eq!(seen.get(), 3);
}

#[test]
fn teardown_suppresses_in_flight_writes() {
    let api = Rc::new(ScriptedApi::default());
    let feed = feed_with(&api);
    let notified = Rc::new(Cell::new(false));
    let flag = Rc::clone(&notified);
    feed.set_listener(move |_| flag.set(true));

    let page = api.defer_page();
    let create = api.defer_create();
    let send_outcome: Rc<RefCell<Option<Result<(), SendError>>>> = Rc::default();
    let mut pool = LocalPool::new();
    let refresh_feed = feed.clone();
    pool.spawner()
        .spawn_local(async move { refresh_feed.refresh().await })
        .expect("spawn");
    let send_feed = feed.clone();
    let task_outcome = Rc::clone(&send_outcome);
    pool.spawner()
        .spawn_local(async move {
            let result = send_feed.send("bye").await;
            *task_outcome.borrow_mut() = Some(result);
        })
        .expect("spawn");
    pool.run_until_stalled();
    let before = feed.view();
    notified.set(false);

    feed.teardown();
    page.send(Ok(vec![message(1, &author(2, "bob"), "late", 0)])).expect("reply");
    create.send(Ok(message(2, &author(1, "ann"), "bye", 0))).expect("reply");
    pool.run_until_stalled();

    assert_eq!(feed.view(), before);
    assert!(!notified.get());
    assert!(matches!(send_outcome.borrow().as_ref(), Some(Err(SendError::Detached))));

    assert!(matches!(block_on(feed.send("again")), Err(SendError::Detached)));
    block_on(feed.refresh());
    assert_eq!(api.calls("fetch_messages"), 1);
}

#[test]
fn is_own_compares_author_ids() {
    let api = Rc::new(ScriptedApi::default());
    let feed = feed_with(&api);
    let mine = FeedEntry::from(&message(1, &author(1, "ann"), "x", 0));
    let theirs = FeedEntry::from(&message(2, &author(2, "ann"), "x", 0));
    assert!(feed.is_own(&mine));
    assert!(!feed.is_own(&theirs));
}

#[test]
fn auth_rejection_while_polling_surfaces_auth_error() {
    let api = Rc::new(ScriptedApi::default());
    let feed = feed_with(&api);
    api.push_page(Err(auth_error()));
    block_on(feed.refresh());
    let error = feed.view().error.expect("error should be set");
    assert_eq!(error.kind, ErrorKind::Auth);
}

// =============================================================
// Scheduling
// =============================================================

#[derive(Clone, Default)]
struct ManualTimer {
    pending: Rc<RefCell<Vec<oneshot::Sender<()>>>>,
}

impl ManualTimer {
    fn sleep(&self) -> impl FnMut(StdDuration) -> LocalBoxFuture<'static, ()> + use<> {
        let pending = Rc::clone(&self.pending);
        move |_| {
            let (tx, rx) = oneshot::channel();
            pending.borrow_mut().push(tx);
            async move {
                let _ = rx.await;
            }
            .boxed_local()
        }
    }

    fn fire(&self) {
        for tx in self.pending.borrow_mut().drain(..) {
            let _ = tx.send(());
        }
    }
}

#[test]
fn mount_refreshes_now_and_on_every_tick() {
    let api = Rc::new(ScriptedApi::default());
    let feed = feed_with(&api);
    let timer = ManualTimer::default();
    let (mount, task) = feed.mount(timer.sleep());

    let mut pool = LocalPool::new();
    pool.spawner().spawn_local(task).expect("spawn");
    pool.run_until_stalled();
    assert_eq!(api.calls("fetch_messages"), 1);

    timer.fire();
    pool.run_until_stalled();
    timer.fire();
    pool.run_until_stalled();
    assert_eq!(api.calls("fetch_messages"), 3);
    drop(mount);
}

#[test]
fn dropping_mount_stops_schedule_and_tears_down() {
    let api = Rc::new(ScriptedApi::default());
    let feed = feed_with(&api);
    let timer = ManualTimer::default();
    let page = api.defer_page();
    let (mount, task) = feed.mount(timer.sleep());

    let mut pool = LocalPool::new();
    pool.spawner().spawn_local(task).expect("spawn");
    pool.run_until_stalled();
    assert_eq!(api.calls("fetch_messages"), 1);

    drop(mount);
    assert!(!feed.is_alive());
    let _ = page.send(Ok(vec![message(1, &author(2, "bob"), "late", 0)]));
    timer.fire();
    pool.run_until_stalled();

    assert_eq!(api.calls("fetch_messages"), 1);
    assert!(feed.view().messages.is_empty());
    assert!(feed.view().loading);
}
