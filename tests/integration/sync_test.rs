//! Synchronization controller integration tests
//!
//! Drives the controller against the in-memory transport and checks the
//! ordering, idempotence, pagination and cancellation guarantees.

use std::time::Duration;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;

use wachat::client::{PageCursor, PageOutcome, PreconditionError, StoreChange, SyncError, TransportError};
use wachat::shared::{ConversationFilter, LiveEvent, MessageStatus, SharedError, StatusUpdate};

use crate::common::*;
use crate::{assert_consistent, assert_err, assert_ok};

#[tokio::test]
async fn test_live_message_lands_between_page_entries() {
    let (rest, controller) = harness();
    rest.set_page(
        "c1",
        1,
        vec![incoming("c1", "a", 100), incoming("c1", "b", 102), incoming("c1", "d", 105)],
        false,
    );

    assert_ok!(controller.load_initial_page("c1").await);
    controller.receive_live_message(incoming("c1", "c", 103)).await;

    let messages = controller.messages("c1").await;
    assert_eq!(timestamps(&messages), vec![100, 102, 103, 105]);
    assert_consistent!(messages);
}

#[tokio::test]
async fn test_initial_page_is_sorted_and_sets_cursor() {
    let (rest, controller) = harness();
    rest.set_page(
        "c1",
        1,
        vec![incoming("c1", "c", 105), incoming("c1", "a", 100), incoming("c1", "b", 102)],
        true,
    );

    let outcome = assert_ok!(controller.load_initial_page("c1").await);
    assert_eq!(outcome, PageOutcome::Applied { added: 3, has_more: true });
    assert_eq!(timestamps(&controller.messages("c1").await), vec![100, 102, 105]);
    assert_eq!(controller.cursor("c1").await, Some(PageCursor { page: 1, has_more: true }));

    let summary = controller.conversation("c1").await.unwrap();
    assert_eq!(summary.last_message, "text c");
}

#[tokio::test]
async fn test_same_live_message_twice_equals_once() {
    let (_rest, controller) = harness();
    let message = incoming("c1", "m1", 100);

    assert!(controller.receive_live_message(message.clone()).await);
    let once = controller.snapshot().await;
    assert!(!controller.receive_live_message(message).await);

    assert_eq!(controller.messages("c1").await.len(), 1);
    assert_eq!(
        controller.conversation("c1").await,
        once.conversations().get("c1").cloned()
    );
    assert_eq!(controller.conversation("c1").await.unwrap().unread_count, 1);
}

#[tokio::test]
async fn test_live_then_page_keeps_single_copy() {
    let (rest, controller) = harness();
    controller.receive_live_message(incoming("c1", "m1", 100)).await;
    rest.set_page("c1", 1, vec![incoming("c1", "m0", 90), incoming("c1", "m1", 100)], false);

    assert_ok!(controller.load_initial_page("c1").await);

    assert_eq!(ids(&controller.messages("c1").await), vec!["m0", "m1"]);
}

#[tokio::test]
async fn test_live_message_during_initial_load_survives_replace() {
    let (rest, controller) = harness();
    rest.set_page("c1", 1, vec![incoming("c1", "a", 100), incoming("c1", "b", 110)], false);
    let gate = rest.gate_pages();

    let loader = tokio::spawn({
        let controller = controller.clone();
        async move { controller.load_initial_page("c1").await }
    });
    wait_until(|| rest.page_calls("c1") == 1).await;

    controller.receive_live_message(incoming("c1", "live", 105)).await;
    gate.add_permits(1);
    assert_ok!(loader.await.unwrap());

    let messages = controller.messages("c1").await;
    assert_eq!(ids(&messages), vec!["a", "live", "b"]);
    assert_consistent!(messages);
}

#[tokio::test]
async fn test_shuffled_duplicated_live_stream_stays_consistent() {
    let (rest, controller) = harness();
    rest.set_page("c1", 1, vec![incoming("c1", "p1", 50), incoming("c1", "p2", 60)], false);
    assert_ok!(controller.load_initial_page("c1").await);

    let arrivals = [70, 55, 70, 65, 55, 80, 50, 60, 75];
    for ts in arrivals {
        controller.receive_live_message(incoming("c1", &format!("l{}", ts), ts)).await;
    }
    controller.receive_live_message(incoming("c1", "p1", 50)).await;

    let messages = controller.messages("c1").await;
    assert_consistent!(messages);
    assert_eq!(messages.len(), 2 + 7);
}

#[tokio::test]
async fn test_older_page_without_more_makes_no_call() {
    let (rest, controller) = harness();
    rest.set_page("c1", 1, vec![incoming("c1", "a", 100)], false);
    assert_ok!(controller.load_initial_page("c1").await);

    let result = controller.load_older_page("c1").await;
    assert_err!(result, SyncError::Precondition(PreconditionError::NoMorePages(_)));
    assert_eq!(rest.page_calls("c1"), 1);
}

#[tokio::test]
async fn test_older_page_before_initial_is_rejected() {
    let (rest, controller) = harness();

    let result = controller.load_older_page("c1").await;
    assert_err!(result, SyncError::Precondition(PreconditionError::NotLoaded(_)));
    assert!(rest.calls().is_empty());
}

#[tokio::test]
async fn test_concurrent_older_loads_make_one_call() {
    let (rest, controller) = harness();
    rest.set_page("c1", 1, vec![incoming("c1", "c", 300), incoming("c1", "d", 400)], true);
    rest.set_page("c1", 2, vec![incoming("c1", "a", 100), incoming("c1", "b", 200)], false);
    assert_ok!(controller.load_initial_page("c1").await);

    let gate = rest.gate_pages();
    let first = tokio::spawn({
        let controller = controller.clone();
        async move { controller.load_older_page("c1").await }
    });
    wait_until(|| rest.page_calls("c1") == 2).await;

    let second = controller.load_older_page("c1").await;
    assert_err!(second, SyncError::Precondition(PreconditionError::LoadInFlight(_)));

    gate.add_permits(1);
    let outcome = assert_ok!(first.await.unwrap());
    assert_eq!(outcome, PageOutcome::Applied { added: 2, has_more: false });
    assert_eq!(rest.page_calls("c1"), 2);
    assert_eq!(ids(&controller.messages("c1").await), vec!["a", "b", "c", "d"]);
    assert_eq!(controller.cursor("c1").await, Some(PageCursor { page: 2, has_more: false }));
}

#[tokio::test]
async fn test_older_page_skips_messages_already_loaded() {
    let (rest, controller) = harness();
    rest.set_page("c1", 1, vec![incoming("c1", "c", 300), incoming("c1", "d", 400)], true);
    rest.set_page(
        "c1",
        2,
        vec![incoming("c1", "b", 200), incoming("c1", "c", 300)],
        true,
    );
    assert_ok!(controller.load_initial_page("c1").await);

    let outcome = assert_ok!(controller.load_older_page("c1").await);
    assert_eq!(outcome, PageOutcome::Applied { added: 1, has_more: true });
    assert_eq!(ids(&controller.messages("c1").await), vec!["b", "c", "d"]);
}

#[tokio::test]
async fn test_navigating_away_discards_older_page() {
    let (rest, controller) = harness();
    rest.set_conversations(vec![
        conversation("c1", "Ana", None, 0),
        conversation("c2", "Ben", None, 0),
    ]);
    rest.set_page("c1", 1, vec![incoming("c1", "c", 300)], true);
    rest.set_page("c1", 2, vec![incoming("c1", "a", 100)], true);

    assert_ok!(controller.open_conversation("c1").await);
    assert_ok!(controller.load_initial_page("c1").await);

    let gate = rest.gate_pages();
    let older = tokio::spawn({
        let controller = controller.clone();
        async move { controller.load_older_page("c1").await }
    });
    wait_until(|| rest.page_calls("c1") == 2).await;

    assert_ok!(controller.open_conversation("c2").await);
    gate.add_permits(1);

    assert_eq!(assert_ok!(older.await.unwrap()), PageOutcome::Discarded);
    assert_eq!(ids(&controller.messages("c1").await), vec!["c"]);
    assert_eq!(controller.cursor("c1").await, Some(PageCursor { page: 1, has_more: true }));

    gate.add_permits(1);
    let retried = assert_ok!(controller.load_older_page("c1").await);
    assert_eq!(retried, PageOutcome::Applied { added: 1, has_more: true });
}

#[tokio::test]
async fn test_forgotten_conversation_discards_late_page() {
    let (rest, controller) = harness();
    rest.set_page("c1", 1, vec![incoming("c1", "a", 100)], false);
    let gate = rest.gate_pages();

    let loader = tokio::spawn({
        let controller = controller.clone();
        async move { controller.load_initial_page("c1").await }
    });
    wait_until(|| rest.page_calls("c1") == 1).await;

    assert!(controller.forget_conversation("c1").await);
    gate.add_permits(1);

    assert_eq!(assert_ok!(loader.await.unwrap()), PageOutcome::Discarded);
    assert!(controller.messages("c1").await.is_empty());
}

#[tokio::test]
async fn test_fetch_failure_is_reported_and_retryable() {
    let (rest, controller) = harness();
    rest.fail_page("c1", 1, TransportError::status(503, "unavailable"));

    let err = controller.load_initial_page("c1").await.unwrap_err();
    assert_matches!(err, SyncError::Fetch(TransportError::Status { status: 503, .. }));
    assert!(err.is_retryable());
    assert_eq!(controller.cursor("c1").await, None);

    rest.set_page("c1", 1, vec![incoming("c1", "a", 1)], false);
    assert_ok!(controller.load_initial_page("c1").await);
}

#[tokio::test]
async fn test_slow_transport_times_out() {
    let (rest, controller) = harness_with(short_timeout(30));
    rest.set_delay(Duration::from_millis(500));

    let err = controller.load_initial_page("c1").await.unwrap_err();
    assert_eq!(err, SyncError::Fetch(TransportError::Timeout));

    let err = controller.mark_read("c1").await.unwrap_err();
    assert_eq!(err, SyncError::Send(TransportError::Timeout));
}

#[tokio::test]
async fn test_mark_read_failure_leaves_unread_count() {
    let (rest, controller) = harness();
    controller.receive_live_message(incoming("c1", "m1", 1)).await;
    controller.receive_live_message(incoming("c1", "m2", 2)).await;
    rest.fail_mark_read(TransportError::Network("connection reset".into()));

    let result = controller.mark_read("c1").await;
    assert_err!(result, SyncError::Send(TransportError::Network(_)));
    assert_eq!(controller.conversation("c1").await.unwrap().unread_count, 2);
}

#[tokio::test]
async fn test_mark_read_success_clears_unread() {
    let (rest, controller) = harness();
    controller.receive_live_message(incoming("c1", "m1", 1)).await;

    assert_ok!(controller.mark_read("c1").await);
    assert_eq!(controller.conversation("c1").await.unwrap().unread_count, 0);
    assert_eq!(rest.calls(), vec![Call::MarkRead("c1".into())]);
}

#[tokio::test]
async fn test_send_then_live_echo_keeps_one_entry() {
    let (rest, controller) = harness();

    let pending = assert_ok!(controller.send_outgoing("c1", "hello there"));
    assert_eq!(pending.conversation_id(), "c1");
    let sent = assert_ok!(pending.wait().await);

    let mut echo = sent.clone();
    echo.is_outgoing = false;
    assert!(!controller.receive_live_message(echo).await);

    let messages = controller.messages("c1").await;
    assert_eq!(messages.len(), 1);
    assert!(messages[0].is_outgoing);
    assert_eq!(
        rest.calls(),
        vec![Call::PostMessage {
            conversation_id: "c1".into(),
            text: "hello there".into(),
            contact_name: None,
        }]
    );
}

#[tokio::test]
async fn test_send_passes_known_contact_name() {
    let (rest, controller) = harness();
    rest.set_conversations(vec![conversation("c1", "Ravi Kumar", None, 0)]);
    assert_ok!(controller.load_conversations(ConversationFilter::All).await);

    let pending = assert_ok!(controller.send_outgoing("c1", "on my way"));
    assert_ok!(pending.wait().await);

    assert_eq!(
        rest.calls().last(),
        Some(&Call::PostMessage {
            conversation_id: "c1".into(),
            text: "on my way".into(),
            contact_name: Some("Ravi Kumar".into()),
        })
    );
}

#[tokio::test]
async fn test_send_failure_inserts_nothing() {
    let (rest, controller) = harness();
    rest.fail_post(TransportError::status(500, "boom"));

    let pending = assert_ok!(controller.send_outgoing("c1", "hello"));
    let err = pending.wait().await.unwrap_err();
    assert_matches!(err, SyncError::Send(TransportError::Status { status: 500, .. }));
    assert!(controller.messages("c1").await.is_empty());
}

#[tokio::test]
async fn test_send_rejects_oversized_text_without_call() {
    let (rest, controller) = harness();

    let result = controller.send_outgoing("c1", &"x".repeat(5000));
    assert_err!(
        result,
        SyncError::Precondition(PreconditionError::InvalidInput(SharedError::TextTooLong { len: 5000, .. }))
    );
    assert!(rest.calls().is_empty());
}

#[tokio::test]
async fn test_unread_only_counts_incoming_outside_active() {
    let (rest, controller) = harness();
    rest.set_conversations(vec![conversation("c1", "Ana", None, 0)]);

    controller.receive_live_message(outgoing("c2", "o1", 1)).await;
    assert_eq!(controller.conversation("c2").await.unwrap().unread_count, 0);

    assert_ok!(controller.open_conversation("c1").await);
    controller.receive_live_message(incoming("c1", "i1", 2)).await;
    assert_eq!(controller.conversation("c1").await.unwrap().unread_count, 0);

    controller.receive_live_message(incoming("c2", "i2", 3)).await;
    assert_eq!(controller.conversation("c2").await.unwrap().unread_count, 1);
}

#[tokio::test]
async fn test_last_message_tracks_newest_only() {
    let (_rest, controller) = harness();
    controller.receive_live_message(incoming("c1", "new", 200)).await;
    controller.receive_live_message(incoming("c1", "old", 100)).await;

    let summary = controller.conversation("c1").await.unwrap();
    assert_eq!(summary.last_message, "text new");
    assert_eq!(summary.last_message_time.unwrap().as_secs(), 200);
    assert_eq!(summary.unread_count, 2);
}

#[tokio::test]
async fn test_load_conversations_merges_and_filters() {
    let (rest, controller) = harness();
    rest.set_conversations(vec![
        conversation("c1", "Ana", Some(100), 0),
        conversation("c2", "Ben", Some(300), 3),
    ]);
    controller.receive_live_message(incoming("c3", "m1", 200)).await;

    assert_eq!(assert_ok!(controller.load_conversations(ConversationFilter::All).await), 2);

    let all: Vec<String> = controller
        .conversations(ConversationFilter::All)
        .await
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(all, vec!["c2", "c3", "c1"]);

    let unread = controller.conversations(ConversationFilter::Unread).await;
    assert_eq!(unread.len(), 2);
    assert_eq!(rest.calls(), vec![Call::FetchConversations(ConversationFilter::All)]);
}

#[tokio::test]
async fn test_status_updates_only_move_forward() {
    let (_rest, controller) = harness();
    controller.receive_live_message(outgoing("c1", "m1", 1)).await;

    let read = StatusUpdate {
        conversation_id: "c1".into(),
        message_id: "m1".into(),
        status: MessageStatus::Read,
    };
    controller.handle_live_event(LiveEvent::StatusUpdated(read)).await;

    let delivered = StatusUpdate {
        conversation_id: "c1".into(),
        message_id: "m1".into(),
        status: MessageStatus::Delivered,
    };
    assert!(!controller.apply_status_update(delivered).await);
    assert_eq!(controller.messages("c1").await[0].status, MessageStatus::Read);
}

#[tokio::test]
async fn test_presence_events_update_known_conversations() {
    let (rest, controller) = harness();
    rest.set_conversations(vec![conversation("c1", "Ana", None, 0)]);
    assert_ok!(controller.load_conversations(ConversationFilter::All).await);

    controller
        .handle_live_event(LiveEvent::Presence { user_id: "c1".into(), online: true })
        .await;
    assert!(controller.conversation("c1").await.unwrap().is_online);

    controller
        .handle_live_event(LiveEvent::Presence { user_id: "c1".into(), online: false })
        .await;
    let summary = controller.conversation("c1").await.unwrap();
    assert!(!summary.is_online);
    assert!(summary.last_seen.is_some());

    assert!(!controller.set_presence("unknown", true).await);
    assert!(controller.conversation("unknown").await.is_none());
}

#[tokio::test]
async fn test_changes_are_published() {
    let (_rest, controller) = harness();
    let mut changes = controller.subscribe();

    controller.receive_live_message(incoming("c1", "m1", 1)).await;

    assert_eq!(
        changes.recv().await.unwrap(),
        StoreChange::MessagesChanged { conversation_id: "c1".into() }
    );
    assert_eq!(
        changes.recv().await.unwrap(),
        StoreChange::ConversationUpdated { id: "c1".into() }
    );
}

#[tokio::test]
async fn test_typing_is_published_without_touching_stores() {
    let (_rest, controller) = harness();
    let mut changes = controller.subscribe();

    controller
        .handle_live_event(LiveEvent::Typing { user_id: "c1".into(), typing: true })
        .await;

    assert_eq!(
        changes.recv().await.unwrap(),
        StoreChange::Typing { conversation_id: "c1".into(), typing: true }
    );
    assert!(controller.conversation("c1").await.is_none());
    assert!(controller.messages("c1").await.is_empty());
}

#[tokio::test]
async fn test_live_messages_during_older_load_merge_with_page() {
    let (rest, controller) = harness();
    rest.set_page("c1", 1, vec![incoming("c1", "c", 300), incoming("c1", "d", 400)], true);
    let mut b_read = incoming("c1", "b", 200);
    b_read.status = MessageStatus::Read;
    rest.set_page("c1", 2, vec![incoming("c1", "a", 100), b_read], true);
    assert_ok!(controller.load_initial_page("c1").await);

    let gate = rest.gate_pages();
    let older = tokio::spawn({
        let controller = controller.clone();
        async move { controller.load_older_page("c1").await }
    });
    wait_until(|| rest.page_calls("c1") == 2).await;

    assert!(controller.receive_live_message(incoming("c1", "x", 150)).await);
    assert!(controller.receive_live_message(incoming("c1", "b", 200)).await);
    assert!(controller.state().await.messages().is_loading_older("c1"));
    gate.add_permits(1);

    let outcome = assert_ok!(older.await.unwrap());
    assert_eq!(outcome, PageOutcome::Applied { added: 1, has_more: true });

    let messages = controller.messages("c1").await;
    assert_eq!(ids(&messages), vec!["a", "x", "b", "c", "d"]);
    assert_eq!(messages[2].status, MessageStatus::Read);
    assert_consistent!(messages);
    assert_eq!(controller.cursor("c1").await, Some(PageCursor { page: 2, has_more: true }));
}
