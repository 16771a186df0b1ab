use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Trainer,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Trainer => "trainer",
            Role::Student => "student",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "trainer" => Some(Role::Trainer),
            "student" => Some(Role::Student),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
    /// Trainers register unapproved and cannot log in until approved.
    pub approved: bool,
    pub created_at: DateTime<Utc>,
}

/// Sender-side edits are allowed for five minutes after `sent_at`.
/// Enforced client-side before any write is attempted, and re-checked by
/// the server.
pub const EDIT_WINDOW_SECS: i64 = 5 * 60;

/// A direct message between two users. Edits keep only the first and the
/// current version of the body; `read_at` is set once and never unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub body: String,
    pub original_body: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
    pub edited_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn conversation(&self) -> ConversationKey {
        ConversationKey::new(self.sender_id, self.receiver_id)
    }

    pub fn is_edited(&self) -> bool {
        self.edited_at.is_some()
    }

    pub fn is_unread_by(&self, viewer_id: Uuid) -> bool {
        self.receiver_id == viewer_id && self.read_at.is_none()
    }

    /// Total order within a conversation: `sent_at` ascending, id as the
    /// deterministic tie-breaker.
    pub fn sort_key(&self) -> (DateTime<Utc>, Uuid) {
        (self.sent_at, self.id)
    }
}

/// Normalized unordered participant pair. A conversation has no identity
/// beyond the two users in it, so the pair is stored in sorted order to make
/// `{A, B}` and `{B, A}` compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationKey {
    a: Uuid,
    b: Uuid,
}

impl ConversationKey {
    pub fn new(x: Uuid, y: Uuid) -> Self {
        if x <= y {
            Self { a: x, b: y }
        } else {
            Self { a: y, b: x }
        }
    }

    pub fn participants(&self) -> (Uuid, Uuid) {
        (self.a, self.b)
    }

    pub fn contains(&self, user_id: Uuid) -> bool {
        self.a == user_id || self.b == user_id
    }

    /// The other participant, or `None` if `user_id` is not in the pair.
    pub fn peer_of(&self, user_id: Uuid) -> Option<Uuid> {
        if self.a == user_id {
            Some(self.b)
        } else if self.b == user_id {
            Some(self.a)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_key_is_unordered() {
        let x = Uuid::new_v4();
        let y = Uuid::new_v4();
        assert_eq!(ConversationKey::new(x, y), ConversationKey::new(y, x));
        assert!(ConversationKey::new(x, y).contains(x));
        assert_eq!(ConversationKey::new(x, y).peer_of(x), Some(y));
        assert_eq!(ConversationKey::new(x, y).peer_of(Uuid::new_v4()), None);
    }
}
