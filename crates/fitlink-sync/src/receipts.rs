use std::collections::HashSet;

use fitlink_types::models::Message;
use uuid::Uuid;

/// Tracks which inbound messages have already been submitted for a
/// mark-read write, so each id is submitted at most once per session even
/// while the server write is still in flight.
#[derive(Debug, Default)]
pub struct ReadReceiptReconciler {
    processed: HashSet<Uuid>,
}

impl ReadReceiptReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resumes from a persisted processed-set, e.g. one saved across app
    /// restarts keyed by viewer identity.
    pub fn from_processed(processed: HashSet<Uuid>) -> Self {
        Self { processed }
    }

    /// Selects the messages addressed to `viewer_id` that are still unread
    /// and not yet submitted, records them as processed, and returns their
    /// ids as one batch for a single mark-read write.
    pub fn scan(&mut self, messages: &[Message], viewer_id: Uuid) -> Vec<Uuid> {
        let to_mark: Vec<Uuid> = messages
            .iter()
            .filter(|m| m.is_unread_by(viewer_id) && !self.processed.contains(&m.id))
            .map(|m| m.id)
            .collect();

        self.processed.extend(&to_mark);
        to_mark
    }

    /// Drops ids back out of the processed-set after a failed mark-read
    /// write, so the next reconciliation pass retries them.
    pub fn forget(&mut self, ids: &[Uuid]) {
        for id in ids {
            self.processed.remove(id);
        }
    }

    /// The accumulated processed-set, for persistence.
    pub fn processed(&self) -> &HashSet<Uuid> {
        &self.processed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use fitlink_types::models::Message;

    fn msg(id: u128, sender: u128, receiver: u128, read: bool) -> Message {
        Message {
            id: Uuid::from_u128(id),
            sender_id: Uuid::from_u128(sender),
            receiver_id: Uuid::from_u128(receiver),
            body: "treino".to_string(),
            original_body: None,
            sent_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
            read_at: read.then(|| Utc.with_ymd_and_hms(2026, 3, 1, 9, 5, 0).unwrap()),
            edited_at: None,
        }
    }

    const VIEWER: u128 = 2;

    #[test]
    fn selects_only_unread_inbound() {
        let mut rec = ReadReceiptReconciler::new();
        let messages = vec![
            msg(10, 1, VIEWER, false), // unread, inbound
            msg(11, 1, VIEWER, true),  // already read
            msg(12, VIEWER, 1, false), // sent by the viewer
        ];

        let marks = rec.scan(&messages, Uuid::from_u128(VIEWER));
        assert_eq!(marks, vec![Uuid::from_u128(10)]);
    }

    #[test]
    fn never_returns_an_id_twice() {
        let mut rec = ReadReceiptReconciler::new();
        let messages = vec![msg(10, 1, VIEWER, false), msg(11, 1, VIEWER, false)];

        let first = rec.scan(&messages, Uuid::from_u128(VIEWER));
        assert_eq!(first.len(), 2);

        // The server write has not round-tripped: read_at is still unset,
        // but a second pass must not resubmit.
        let second = rec.scan(&messages, Uuid::from_u128(VIEWER));
        assert!(second.is_empty());
    }

    #[test]
    fn forget_reopens_ids_for_retry() {
        let mut rec = ReadReceiptReconciler::new();
        let messages = vec![msg(10, 1, VIEWER, false)];

        let batch = rec.scan(&messages, Uuid::from_u128(VIEWER));
        rec.forget(&batch);

        assert_eq!(rec.scan(&messages, Uuid::from_u128(VIEWER)), batch);
    }

    #[test]
    fn persisted_set_survives_reconstruction() {
        let mut rec = ReadReceiptReconciler::new();
        let messages = vec![msg(10, 1, VIEWER, false)];
        rec.scan(&messages, Uuid::from_u128(VIEWER));

        let restored = rec.processed().clone();
        let mut rec = ReadReceiptReconciler::from_processed(restored);
        assert!(rec.scan(&messages, Uuid::from_u128(VIEWER)).is_empty());
    }
}
