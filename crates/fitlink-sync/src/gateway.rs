use fitlink_types::models::Message;
use uuid::Uuid;

/// Errors from the backend data gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Transport-level failure — the request may never have reached the server.
    #[error("network error: {0}")]
    Network(String),

    /// The server received and rejected the request.
    #[error("rejected by server: {0}")]
    Rejected(String),
}

/// The backend operations the sync core needs. The gateway is authenticated
/// as one user; every call is implicitly scoped to that viewer.
pub trait MessageGateway: Send + Sync {
    /// Full conversation snapshot with `peer_id`, ascending by sent time.
    fn fetch_conversation(
        &self,
        peer_id: Uuid,
    ) -> impl Future<Output = Result<Vec<Message>, GatewayError>> + Send;

    /// Stores a new message and returns the full row. The server assigns
    /// `id` and `sent_at`; callers must await this before constructing any
    /// local optimistic entry so that entry carries the server id.
    fn send_message(
        &self,
        receiver_id: Uuid,
        body: &str,
    ) -> impl Future<Output = Result<Message, GatewayError>> + Send;

    /// Rewrites a message body and returns the updated row.
    fn edit_message(
        &self,
        message_id: Uuid,
        body: &str,
    ) -> impl Future<Output = Result<Message, GatewayError>> + Send;

    /// Batched mark-read write for inbound messages.
    fn mark_read(
        &self,
        message_ids: &[Uuid],
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;
}
