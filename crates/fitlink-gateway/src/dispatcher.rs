use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use fitlink_types::events::ChatEvent;

/// Manages connected clients and routes chat events to the two
/// participants of the affected conversation.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Per-user send channels: user_id -> (conn_id, sender).
    /// One connection per user; a newer connection replaces the older one.
    user_channels: RwLock<HashMap<Uuid, (Uuid, mpsc::UnboundedSender<ChatEvent>)>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                user_channels: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Register a per-user channel. Returns (conn_id, receiver).
    pub async fn register_user_channel(
        &self,
        user_id: Uuid,
    ) -> (Uuid, mpsc::UnboundedReceiver<ChatEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .user_channels
            .write()
            .await
            .insert(user_id, (conn_id, tx));
        (conn_id, rx)
    }

    /// Unregister a per-user channel, but only if conn_id matches —
    /// a newer connection may have taken over the slot.
    pub async fn unregister_user_channel(&self, user_id: Uuid, conn_id: Uuid) {
        let mut channels = self.inner.user_channels.write().await;
        if let Some((stored_conn_id, _)) = channels.get(&user_id) {
            if *stored_conn_id == conn_id {
                channels.remove(&user_id);
            }
        }
    }

    /// Send a targeted event to a specific user, if connected.
    pub async fn send_to_user(&self, user_id: Uuid, event: ChatEvent) {
        let channels = self.inner.user_channels.read().await;
        if let Some((_, tx)) = channels.get(&user_id) {
            let _ = tx.send(event);
        }
    }

    /// Deliver a conversation-scoped event to both participants.
    /// Events without a conversation are dropped here; those are
    /// connection-scoped and sent directly by the connection loop.
    pub async fn publish(&self, event: ChatEvent) {
        let Some(key) = event.conversation() else {
            return;
        };
        let (a, b) = key.participants();
        self.send_to_user(a, event.clone()).await;
        self.send_to_user(b, event).await;
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
