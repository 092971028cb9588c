//! Editor-level auto-save behaviour under paused time

use std::sync::Arc;
use std::time::Duration;
use vcg_graph::{NodeKind, NodePatch};
use vcg_session::{DocumentId, MemoryPersistence, SaveOutcome, SessionEvent};
use vcg_test_utils::{node, open_editor, wait_for, FlakyPersistence, LoopbackHub, DOCUMENT};

fn is_save_result(event: &SessionEvent) -> bool {
    matches!(
        event,
        SessionEvent::AutoSaved(_) | SessionEvent::AutoSaveSkipped | SessionEvent::AutoSaveFailed(_)
    )
}

#[tokio::test(start_paused = true)]
async fn burst_of_edits_saves_once() {
    let hub = LoopbackHub::new();
    let persistence = Arc::new(MemoryPersistence::new());
    let mut editor = open_editor("alice", persistence.clone(), &hub).await;

    for i in 0..5 {
        editor
            .add_node(node(&format!("n{i}"), NodeKind::Primary, "Step"))
            .unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
    assert_eq!(persistence.save_count(), 0);

    let event = wait_for(&mut editor, is_save_result).await;
    let SessionEvent::AutoSaved(fingerprint) = event else {
        panic!("expected a save, got {event:?}");
    };
    assert_eq!(persistence.save_count(), 1);
    assert_eq!(fingerprint, editor.graph().fingerprint().unwrap());
    assert_eq!(
        persistence.current(&DocumentId::from(DOCUMENT)).unwrap(),
        editor.snapshot()
    );
}

#[tokio::test(start_paused = true)]
async fn unchanged_graph_is_not_saved_again() {
    let hub = LoopbackHub::new();
    let persistence = Arc::new(MemoryPersistence::new());
    let mut editor = open_editor("alice", persistence.clone(), &hub).await;

    editor.add_node(node("n1", NodeKind::Primary, "Sales")).unwrap();
    wait_for(&mut editor, is_save_result).await;
    assert!(!editor.is_dirty());

    // Rename and rename back inside one window
    let id = "n1".into();
    editor
        .update_node(&id, &NodePatch::new().label("Marketing"))
        .unwrap();
    editor.update_node(&id, &NodePatch::new().label("Sales")).unwrap();

    let event = wait_for(&mut editor, is_save_result).await;
    assert!(matches!(event, SessionEvent::AutoSaveSkipped));
    assert_eq!(persistence.save_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_save_is_retried_on_next_change() {
    let hub = LoopbackHub::new();
    let persistence = Arc::new(FlakyPersistence::new());
    persistence.set_online(false);
    let mut editor = open_editor("alice", persistence.clone(), &hub).await;

    editor.add_node(node("n1", NodeKind::Primary, "Sales")).unwrap();
    let event = wait_for(&mut editor, is_save_result).await;
    let SessionEvent::AutoSaveFailed(error) = event else {
        panic!("expected a failure, got {event:?}");
    };
    assert!(error.is_retryable());
    assert!(editor.is_dirty());

    persistence.set_online(true);
    editor.add_node(node("n2", NodeKind::Support, "HR")).unwrap();
    let event = wait_for(&mut editor, is_save_result).await;
    assert!(matches!(event, SessionEvent::AutoSaved(_)));

    assert_eq!(persistence.save_attempts(), 2);
    let saved = persistence
        .inner()
        .current(&DocumentId::from(DOCUMENT))
        .unwrap();
    assert_eq!(saved.node_count(), 2);
    assert!(!editor.is_dirty());
}

#[tokio::test(start_paused = true)]
async fn dispose_cancels_pending_save() {
    let hub = LoopbackHub::new();
    let persistence = Arc::new(FlakyPersistence::new());
    let mut editor = open_editor("alice", persistence.clone(), &hub).await;

    editor.add_node(node("n1", NodeKind::Primary, "Sales")).unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    editor.dispose();

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(persistence.save_attempts(), 0);
    assert!(editor.next_event().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn save_in_flight_at_dispose_is_not_reported() {
    let hub = LoopbackHub::new();
    let persistence = Arc::new(FlakyPersistence::new());
    persistence.set_save_delay(Some(Duration::from_secs(5)));
    let mut editor = open_editor("alice", persistence.clone(), &hub).await;

    editor.add_node(node("n1", NodeKind::Primary, "Sales")).unwrap();
    // Debounce elapsed, save is now sleeping inside the backend
    tokio::time::sleep(Duration::from_secs(12)).await;
    assert_eq!(persistence.save_attempts(), 1);

    editor.dispose();
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert!(editor.is_dirty());
    assert!(editor.next_event().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn close_flushes_immediately() {
    let hub = LoopbackHub::new();
    let persistence = Arc::new(MemoryPersistence::new());
    let mut editor = open_editor("alice", persistence.clone(), &hub).await;

    editor.add_node(node("n1", NodeKind::Primary, "Sales")).unwrap();
    let expected = editor.graph().fingerprint().unwrap();

    let outcome = editor.close().await;
    assert_eq!(outcome, SaveOutcome::Saved(expected));
    assert_eq!(persistence.save_count(), 1);
    assert!(editor.is_closed());

    // Second close has nothing left to do
    assert_eq!(editor.close().await, SaveOutcome::Discarded);
}

#[tokio::test(start_paused = true)]
async fn remote_merges_do_not_trigger_local_saves() {
    let hub = LoopbackHub::new();
    let alice_store = Arc::new(MemoryPersistence::new());
    let bob_store = Arc::new(MemoryPersistence::new());

    let mut alice = open_editor("alice", alice_store.clone(), &hub).await;
    let mut bob = open_editor("bob", bob_store.clone(), &hub).await;
    wait_for(&mut alice, |e| matches!(e, SessionEvent::PeersChanged(p) if !p.is_empty())).await;

    alice.add_node(node("n1", NodeKind::Primary, "Sales")).unwrap();
    wait_for(&mut bob, |e| matches!(e, SessionEvent::RemoteMerged(_))).await;
    wait_for(&mut alice, is_save_result).await;

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(alice_store.save_count(), 1);
    assert_eq!(bob_store.save_count(), 0);
    assert!(bob.is_dirty());
}
