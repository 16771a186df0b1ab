use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, trace};
use uuid::Uuid;

use fitlink_types::events::ChatEvent;
use fitlink_types::models::{ConversationKey, Message};
pub use fitlink_types::models::EDIT_WINDOW_SECS;

use crate::gateway::{GatewayError, MessageGateway};
use crate::receipts::ReadReceiptReconciler;
use crate::store::MessageStore;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("message body is empty")]
    EmptyBody,

    #[error("no active conversation")]
    NoConversation,

    #[error("unknown message")]
    UnknownMessage,

    #[error("only the sender can edit a message")]
    NotSender,

    #[error("the edit window has closed")]
    EditWindowClosed,

    /// The unsent body rides along so the caller can restore it into the
    /// input field.
    #[error("send failed: {source}")]
    SendFailed { source: GatewayError, body: String },

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Client-side edit guard, checked before any network call is attempted.
pub fn can_edit(
    message: &Message,
    editor_id: Uuid,
    now: DateTime<Utc>,
) -> Result<(), SessionError> {
    if message.sender_id != editor_id {
        return Err(SessionError::NotSender);
    }
    if now.signed_duration_since(message.sent_at).num_seconds() > EDIT_WINDOW_SECS {
        return Err(SessionError::EditWindowClosed);
    }
    Ok(())
}

/// One viewer's handle on the active conversation.
///
/// Owns the store and the reconciler for exactly one conversation at a time.
/// Every `open` bumps a generation counter, and every async completion
/// re-checks the generation it captured before touching the store — a
/// completion that resolves after the view moved on is dropped instead of
/// mutating state it no longer owns.
pub struct ConversationSession<G> {
    gateway: Arc<G>,
    viewer_id: Uuid,
    inner: Mutex<Inner>,
}

struct Inner {
    generation: u64,
    active: Option<Active>,
}

struct Active {
    peer_id: Uuid,
    key: ConversationKey,
    store: MessageStore,
    reconciler: ReadReceiptReconciler,
}

impl<G: MessageGateway> ConversationSession<G> {
    pub fn new(gateway: Arc<G>, viewer_id: Uuid) -> Self {
        Self {
            gateway,
            viewer_id,
            inner: Mutex::new(Inner {
                generation: 0,
                active: None,
            }),
        }
    }

    pub fn viewer_id(&self) -> Uuid {
        self.viewer_id
    }

    pub fn active_peer(&self) -> Option<Uuid> {
        self.lock().active.as_ref().map(|a| a.peer_id)
    }

    /// Ordered snapshot of the active conversation for rendering.
    pub fn messages(&self) -> Vec<Message> {
        self.lock()
            .active
            .as_ref()
            .map(|a| a.store.all().to_vec())
            .unwrap_or_default()
    }

    /// The reconciler's accumulated processed-set, for persistence across
    /// restarts.
    pub fn processed_read_ids(&self) -> HashSet<Uuid> {
        self.lock()
            .active
            .as_ref()
            .map(|a| a.reconciler.processed().clone())
            .unwrap_or_default()
    }

    /// Opens the conversation with `peer_id`: fetches the snapshot, loads
    /// the store, and runs an initial read-receipt pass.
    pub async fn open(&self, peer_id: Uuid) -> Result<(), SessionError> {
        self.open_with_processed(peer_id, HashSet::new()).await
    }

    /// Like [`ConversationSession::open`], resuming a persisted
    /// processed-set so mark-read writes already submitted in an earlier
    /// session are not resubmitted.
    pub async fn open_with_processed(
        &self,
        peer_id: Uuid,
        processed: HashSet<Uuid>,
    ) -> Result<(), SessionError> {
        let generation = {
            let mut inner = self.lock();
            inner.generation += 1;
            inner.active = Some(Active {
                peer_id,
                key: ConversationKey::new(self.viewer_id, peer_id),
                store: MessageStore::new(),
                reconciler: ReadReceiptReconciler::from_processed(processed),
            });
            inner.generation
        };

        let messages = self.gateway.fetch_conversation(peer_id).await?;

        let to_mark = {
            let mut inner = self.lock();
            if inner.generation != generation {
                // The view moved on while the fetch was in flight
                trace!(peer = %peer_id, "discarding snapshot for superseded conversation");
                return Ok(());
            }
            let Some(active) = inner.active.as_mut() else {
                return Ok(());
            };
            active.store.load(messages);
            active.reconciler.scan(active.store.all(), self.viewer_id)
        };

        self.submit_marks(generation, to_mark).await;
        Ok(())
    }

    /// Tears down the active conversation. In-flight completions for it
    /// will be dropped when they resolve.
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.active = None;
    }

    /// Sends `body` to the active peer. The gateway returns the stored row,
    /// which is appended optimistically under the server-assigned id; the
    /// push-feed confirmation later collapses onto it.
    pub async fn send(&self, body: &str) -> Result<Message, SessionError> {
        if body.trim().is_empty() {
            return Err(SessionError::EmptyBody);
        }

        let (generation, peer_id) = {
            let inner = self.lock();
            let active = inner.active.as_ref().ok_or(SessionError::NoConversation)?;
            (inner.generation, active.peer_id)
        };

        let message = self
            .gateway
            .send_message(peer_id, body)
            .await
            .map_err(|source| SessionError::SendFailed {
                source,
                body: body.to_string(),
            })?;

        let mut inner = self.lock();
        if inner.generation == generation {
            if let Some(active) = inner.active.as_mut() {
                active.store.append_optimistic(message.clone());
            }
        }
        Ok(message)
    }

    /// Edits a previously sent message. Rejected locally unless the viewer
    /// is the sender, the edit window is still open, and the body is
    /// non-empty; only then is the write attempted.
    pub async fn edit(&self, message_id: Uuid, body: &str) -> Result<Message, SessionError> {
        if body.trim().is_empty() {
            return Err(SessionError::EmptyBody);
        }

        let generation = {
            let inner = self.lock();
            let active = inner.active.as_ref().ok_or(SessionError::NoConversation)?;
            let message = active
                .store
                .get(message_id)
                .ok_or(SessionError::UnknownMessage)?;
            can_edit(message, self.viewer_id, Utc::now())?;
            inner.generation
        };

        let updated = self.gateway.edit_message(message_id, body).await?;

        let mut inner = self.lock();
        if inner.generation == generation {
            if let Some(active) = inner.active.as_mut() {
                active.store.upsert(updated.clone());
            }
        }
        Ok(updated)
    }

    /// Feeds one push-feed event into the store. Events for other
    /// conversations of the same viewer are ignored here; a fresh `open`
    /// fetches them later. New inbound messages trigger a reconcile pass so
    /// they are marked read while the conversation is on screen.
    pub async fn apply_event(&self, event: ChatEvent) {
        let (generation, to_mark) = {
            let mut inner = self.lock();
            let generation = inner.generation;
            let Some(active) = inner.active.as_mut() else {
                return;
            };
            match event {
                ChatEvent::MessageCreate { message } | ChatEvent::MessageUpdate { message } => {
                    if message.conversation() != active.key {
                        return;
                    }
                    active.store.upsert(message);
                }
                ChatEvent::Ready { .. } => return,
            }
            let viewer_id = self.viewer_id;
            let to_mark = active.reconciler.scan(active.store.all(), viewer_id);
            (generation, to_mark)
        };

        self.submit_marks(generation, to_mark).await;
    }

    /// Best-effort batched mark-read write. Failures are silent: the batch
    /// is forgotten so the next reconcile pass retries it.
    async fn submit_marks(&self, generation: u64, to_mark: Vec<Uuid>) {
        if to_mark.is_empty() {
            return;
        }

        match self.gateway.mark_read(&to_mark).await {
            Ok(()) => trace!(count = to_mark.len(), "submitted mark-read batch"),
            Err(e) => {
                debug!(count = to_mark.len(), error = %e, "mark-read write failed");
                let mut inner = self.lock();
                if inner.generation == generation {
                    if let Some(active) = inner.active.as_mut() {
                        active.reconciler.forget(&to_mark);
                    }
                }
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Short critical sections only; never held across an await
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
