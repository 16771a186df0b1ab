use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ConversationKey, Message};

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ChatEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid, username: String },

    /// A new message was stored
    MessageCreate { message: Message },

    /// An existing message changed (edit or read receipt)
    MessageUpdate { message: Message },
}

impl ChatEvent {
    /// Returns the conversation this event belongs to, if any.
    /// Events that return `None` are connection-scoped (e.g. `Ready`).
    pub fn conversation(&self) -> Option<ConversationKey> {
        match self {
            Self::MessageCreate { message } | Self::MessageUpdate { message } => {
                Some(message.conversation())
            }
            Self::Ready { .. } => None,
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },
}
