//! End-to-end session flows against an in-memory mock gateway: optimistic
//! send collapse, the A-to-B mark-read round trip, best-effort retry, and
//! the stale-completion guard.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use fitlink_sync::{ConversationSession, GatewayError, MessageGateway, SessionError};
use fitlink_types::events::ChatEvent;
use fitlink_types::models::{ConversationKey, Message};

#[derive(Default)]
struct BackendState {
    messages: Vec<Message>,
    mark_batches: Vec<Vec<Uuid>>,
    send_calls: usize,
    /// When false, mark-read batches are recorded but read_at is left
    /// untouched, simulating a write that has not round-tripped yet.
    skip_apply_marks: bool,
    fail_send: bool,
    fail_next_mark_read: bool,
    fetch_delays: HashMap<Uuid, Duration>,
}

#[derive(Clone, Default)]
struct MockBackend(Arc<Mutex<BackendState>>);

impl MockBackend {
    fn lock(&self) -> std::sync::MutexGuard<'_, BackendState> {
        self.0.lock().unwrap()
    }

    fn gateway_for(&self, viewer: Uuid) -> MockGateway {
        MockGateway {
            backend: self.clone(),
            viewer,
        }
    }

    fn seed_message(&self, sender: Uuid, receiver: Uuid, body: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.lock().messages.push(Message {
            id,
            sender_id: sender,
            receiver_id: receiver,
            body: body.to_string(),
            original_body: None,
            sent_at: Utc::now(),
            read_at: None,
            edited_at: None,
        });
        id
    }
}

struct MockGateway {
    backend: MockBackend,
    viewer: Uuid,
}

impl MessageGateway for MockGateway {
    async fn fetch_conversation(&self, peer_id: Uuid) -> Result<Vec<Message>, GatewayError> {
        let delay = self.backend.lock().fetch_delays.get(&peer_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.backend.lock();
        let key = ConversationKey::new(self.viewer, peer_id);
        Ok(state
            .messages
            .iter()
            .filter(|m| m.conversation() == key)
            .cloned()
            .collect())
    }

    async fn send_message(&self, receiver_id: Uuid, body: &str) -> Result<Message, GatewayError> {
        let mut state = self.backend.lock();
        state.send_calls += 1;
        if state.fail_send {
            return Err(GatewayError::Network("connection reset".into()));
        }

        let message = Message {
            id: Uuid::new_v4(),
            sender_id: self.viewer,
            receiver_id,
            body: body.to_string(),
            original_body: None,
            sent_at: Utc::now(),
            read_at: None,
            edited_at: None,
        };
        state.messages.push(message.clone());
        Ok(message)
    }

    async fn edit_message(&self, message_id: Uuid, body: &str) -> Result<Message, GatewayError> {
        let mut state = self.backend.lock();
        let viewer = self.viewer;
        let message = state
            .messages
            .iter_mut()
            .find(|m| m.id == message_id && m.sender_id == viewer)
            .ok_or_else(|| GatewayError::Rejected("not the sender".into()))?;

        if message.original_body.is_none() {
            message.original_body = Some(message.body.clone());
        }
        message.body = body.to_string();
        message.edited_at = Some(Utc::now());
        Ok(message.clone())
    }

    async fn mark_read(&self, message_ids: &[Uuid]) -> Result<(), GatewayError> {
        let mut state = self.backend.lock();
        if state.fail_next_mark_read {
            state.fail_next_mark_read = false;
            return Err(GatewayError::Network("timeout".into()));
        }

        state.mark_batches.push(message_ids.to_vec());
        if !state.skip_apply_marks {
            let now = Utc::now();
            for m in &mut state.messages {
                if message_ids.contains(&m.id) && m.receiver_id == self.viewer && m.read_at.is_none()
                {
                    m.read_at = Some(now);
                }
            }
        }
        Ok(())
    }
}

#[tokio::test]
async fn send_then_push_confirmation_yields_one_entry() {
    let backend = MockBackend::default();
    let (alice, bruno) = (Uuid::from_u128(1), Uuid::from_u128(2));

    let session = ConversationSession::new(Arc::new(backend.gateway_for(alice)), alice);
    session.open(bruno).await.unwrap();

    let sent = session.send("Oi").await.unwrap();
    assert_eq!(session.messages().len(), 1);

    // The push feed delivers the confirmed copy of the same row
    session
        .apply_event(ChatEvent::MessageCreate {
            message: sent.clone(),
        })
        .await;

    let messages = session.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].id, sent.id);
    assert_eq!(messages[0].body, "Oi");
}

#[tokio::test]
async fn unread_inbound_is_marked_exactly_once() {
    let backend = MockBackend::default();
    let (alice, bruno) = (Uuid::from_u128(1), Uuid::from_u128(2));

    // Alice sends "Oi" to Bruno
    let alice_session = ConversationSession::new(Arc::new(backend.gateway_for(alice)), alice);
    alice_session.open(bruno).await.unwrap();
    let sent = alice_session.send("Oi").await.unwrap();
    assert!(sent.read_at.is_none());

    // The sender's own reconcile pass issues nothing
    assert!(backend.lock().mark_batches.is_empty());

    // Bruno opens the conversation: one batched mark-read write for "Oi"
    let bruno_session = ConversationSession::new(Arc::new(backend.gateway_for(bruno)), bruno);
    bruno_session.open(alice).await.unwrap();

    let batches = backend.lock().mark_batches.clone();
    assert_eq!(batches, vec![vec![sent.id]]);

    // Reopening with the persisted processed-set issues zero writes
    let processed = bruno_session.processed_read_ids();
    let resumed = ConversationSession::new(Arc::new(backend.gateway_for(bruno)), bruno);
    resumed.open_with_processed(alice, processed).await.unwrap();
    assert_eq!(backend.lock().mark_batches.len(), 1);
}

#[tokio::test]
async fn in_flight_mark_is_not_resubmitted() {
    let backend = MockBackend::default();
    backend.lock().skip_apply_marks = true;
    let (alice, bruno) = (Uuid::from_u128(1), Uuid::from_u128(2));
    let id = backend.seed_message(alice, bruno, "Treino amanhã?");

    let session = ConversationSession::new(Arc::new(backend.gateway_for(bruno)), bruno);
    session.open(alice).await.unwrap();
    assert_eq!(backend.lock().mark_batches.len(), 1);

    // read_at never round-tripped, but a duplicate event must not trigger
    // a second submission for the same id
    let message = session.messages().into_iter().find(|m| m.id == id).unwrap();
    session.apply_event(ChatEvent::MessageCreate { message }).await;
    assert_eq!(backend.lock().mark_batches.len(), 1);
}

#[tokio::test]
async fn failed_mark_read_is_retried_on_next_pass() {
    let backend = MockBackend::default();
    backend.lock().fail_next_mark_read = true;
    let (alice, bruno) = (Uuid::from_u128(1), Uuid::from_u128(2));
    let id = backend.seed_message(alice, bruno, "Bom dia");

    let session = ConversationSession::new(Arc::new(backend.gateway_for(bruno)), bruno);
    session.open(alice).await.unwrap();

    // First attempt failed silently; nothing recorded yet
    assert!(backend.lock().mark_batches.is_empty());

    // The next reconcile trigger resubmits the forgotten batch
    let message = session.messages().into_iter().find(|m| m.id == id).unwrap();
    session.apply_event(ChatEvent::MessageUpdate { message }).await;
    assert_eq!(backend.lock().mark_batches, vec![vec![id]]);
}

#[tokio::test]
async fn superseded_open_discards_its_late_snapshot() {
    let backend = MockBackend::default();
    let (viewer, slow_peer, fast_peer) =
        (Uuid::from_u128(1), Uuid::from_u128(2), Uuid::from_u128(3));

    // The slow peer's conversation holds an unread inbound message that must
    // never be loaded or marked once the view moves on
    backend.seed_message(slow_peer, viewer, "ainda aí?");
    backend
        .lock()
        .fetch_delays
        .insert(slow_peer, Duration::from_millis(80));

    let session = Arc::new(ConversationSession::new(
        Arc::new(backend.gateway_for(viewer)),
        viewer,
    ));

    let slow_open = tokio::spawn({
        let session = session.clone();
        async move { session.open(slow_peer).await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;

    session.open(fast_peer).await.unwrap();
    slow_open.await.unwrap().unwrap();

    assert_eq!(session.active_peer(), Some(fast_peer));
    assert!(session.messages().is_empty());
    assert!(backend.lock().mark_batches.is_empty());
}

#[tokio::test]
async fn empty_send_is_rejected_before_any_network_call() {
    let backend = MockBackend::default();
    let (alice, bruno) = (Uuid::from_u128(1), Uuid::from_u128(2));

    let session = ConversationSession::new(Arc::new(backend.gateway_for(alice)), alice);
    session.open(bruno).await.unwrap();

    assert!(matches!(
        session.send("   ").await,
        Err(SessionError::EmptyBody)
    ));
    assert_eq!(backend.lock().send_calls, 0);
}

#[tokio::test]
async fn failed_send_returns_the_unsent_body() {
    let backend = MockBackend::default();
    backend.lock().fail_send = true;
    let (alice, bruno) = (Uuid::from_u128(1), Uuid::from_u128(2));

    let session = ConversationSession::new(Arc::new(backend.gateway_for(alice)), alice);
    session.open(bruno).await.unwrap();

    match session.send("não perca o treino").await {
        Err(SessionError::SendFailed { body, .. }) => assert_eq!(body, "não perca o treino"),
        other => panic!("expected SendFailed, got {other:?}"),
    }
    assert!(session.messages().is_empty());
}

#[tokio::test]
async fn edit_updates_the_store_and_keeps_the_first_version() {
    let backend = MockBackend::default();
    let (alice, bruno) = (Uuid::from_u128(1), Uuid::from_u128(2));

    let session = ConversationSession::new(Arc::new(backend.gateway_for(alice)), alice);
    session.open(bruno).await.unwrap();
    let sent = session.send("agachamento 3x10").await.unwrap();

    session.edit(sent.id, "agachamento 4x10").await.unwrap();
    session.edit(sent.id, "agachamento 4x12").await.unwrap();

    let messages = session.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].body, "agachamento 4x12");
    assert_eq!(messages[0].original_body.as_deref(), Some("agachamento 3x10"));
    assert!(messages[0].edited_at.is_some());
}

#[tokio::test]
async fn events_for_other_conversations_are_ignored() {
    let backend = MockBackend::default();
    let (alice, bruno, carla) = (Uuid::from_u128(1), Uuid::from_u128(2), Uuid::from_u128(3));

    let session = ConversationSession::new(Arc::new(backend.gateway_for(alice)), alice);
    session.open(bruno).await.unwrap();

    let stray = Message {
        id: Uuid::new_v4(),
        sender_id: carla,
        receiver_id: alice,
        body: "outra conversa".to_string(),
        original_body: None,
        sent_at: Utc::now(),
        read_at: None,
        edited_at: None,
    };
    session.apply_event(ChatEvent::MessageCreate { message: stray }).await;

    assert!(session.messages().is_empty());
    assert!(backend.lock().mark_batches.is_empty());
}
