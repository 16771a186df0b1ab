//! Client-side message synchronization.
//!
//! Merges three message-state sources into one consistent ordered view per
//! conversation: the initial fetch, the server's push feed, and locally
//! optimistic sends/edits. [`MessageStore`] holds the ordered view,
//! [`ReadReceiptReconciler`] tracks which inbound messages still need a
//! mark-read write, and [`ConversationSession`] ties both to a
//! [`MessageGateway`].

pub mod gateway;
pub mod http;
pub mod receipts;
pub mod session;
pub mod store;

pub use gateway::{GatewayError, MessageGateway};
pub use receipts::ReadReceiptReconciler;
pub use session::{ConversationSession, EDIT_WINDOW_SECS, SessionError, can_edit};
pub use store::MessageStore;
