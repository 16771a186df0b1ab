use fitlink_types::models::Message;
use uuid::Uuid;

/// Ordered client-side view of one conversation's messages.
///
/// Entries are unique by id and sorted ascending by `(sent_at, id)`.
/// Updates arrive from three sources — the initial fetch, the push feed,
/// and local optimistic writes — and all of them funnel through
/// [`MessageStore::upsert`], so a confirmed copy of an optimistic entry
/// replaces it instead of duplicating it.
#[derive(Debug, Default)]
pub struct MessageStore {
    messages: Vec<Message>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the contents with a server snapshot. Called once per
    /// conversation open.
    pub fn load(&mut self, mut messages: Vec<Message>) {
        messages.sort_by_key(Message::sort_key);
        messages.dedup_by_key(|m| m.id);
        self.messages = messages;
    }

    /// Inserts a new message or replaces the entry with the same id.
    ///
    /// Replacement is last-write-wins by arrival order. No version ordering
    /// is enforced, so a late notification can overwrite a newer local
    /// state.
    pub fn upsert(&mut self, message: Message) {
        if let Some(pos) = self.messages.iter().position(|m| m.id == message.id) {
            self.messages.remove(pos);
        }
        let at = self
            .messages
            .partition_point(|m| m.sort_key() < message.sort_key());
        self.messages.insert(at, message);
    }

    /// Inserts a client-synthesized entry ahead of server confirmation.
    ///
    /// Contract: `message.id` must be the server-assigned id (the send call
    /// returns the stored row before this is invoked), so the confirmed copy
    /// arriving later via [`MessageStore::upsert`] collapses onto this entry.
    pub fn append_optimistic(&mut self, message: Message) {
        self.upsert(message);
    }

    /// Ordered snapshot for rendering.
    pub fn all(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, id: Uuid) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
