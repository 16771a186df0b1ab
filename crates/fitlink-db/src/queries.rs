use crate::Database;
use crate::models::{MessageRow, UserRow};
use anyhow::Result;
use rusqlite::Connection;

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        password_hash: &str,
        role: &str,
        approved: bool,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, password, role, approved) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, username, password_hash, role, approved],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    /// Returns false if the user does not exist or was already approved.
    pub fn approve_user(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET approved = 1 WHERE id = ?1 AND approved = 0",
                [id],
            )?;
            Ok(changed > 0)
        })
    }

    // -- Messages --

    pub fn insert_message(
        &self,
        id: &str,
        sender_id: &str,
        receiver_id: &str,
        body: &str,
        sent_at: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO messages (id, sender_id, receiver_id, body, sent_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, sender_id, receiver_id, body, sent_at],
            )?;
            Ok(())
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{MESSAGE_COLUMNS} WHERE id = ?1"))?;
            let row = stmt.query_row([id], map_message_row).optional()?;
            Ok(row)
        })
    }

    /// Messages exchanged between the two users, ascending by (sent_at, id).
    /// `before` pages backwards: only messages strictly older than the given
    /// timestamp are returned.
    pub fn get_conversation(
        &self,
        user_a: &str,
        user_b: &str,
        limit: u32,
        before: Option<&str>,
    ) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{MESSAGE_COLUMNS}
                 WHERE ((sender_id = ?1 AND receiver_id = ?2)
                     OR (sender_id = ?2 AND receiver_id = ?1))
                   AND (?3 IS NULL OR sent_at < ?3)
                 ORDER BY sent_at DESC, id DESC
                 LIMIT ?4"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt
                .query_map(rusqlite::params![user_a, user_b, before, limit], map_message_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            // Newest-first page, flipped to the ascending order clients consume
            rows.reverse();
            Ok(rows)
        })
    }

    /// Applies an edit, capturing the pre-edit body into `original_body` on
    /// the first edit only. Returns false when no row matched the sender.
    pub fn edit_message(
        &self,
        id: &str,
        sender_id: &str,
        body: &str,
        edited_at: &str,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE messages
                 SET original_body = COALESCE(original_body, body),
                     body = ?3,
                     edited_at = ?4
                 WHERE id = ?1 AND sender_id = ?2",
                rusqlite::params![id, sender_id, body, edited_at],
            )?;
            Ok(changed > 0)
        })
    }

    /// Batch-set `read_at` for the receiver's still-unread messages.
    /// Returns the rows that were actually marked by this call, so already
    /// read ids and ids addressed to someone else drop out silently.
    pub fn mark_read(
        &self,
        message_ids: &[String],
        receiver_id: &str,
        read_at: &str,
    ) -> Result<Vec<MessageRow>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn_mut(|conn| {
            let placeholders: Vec<String> =
                (3..3 + message_ids.len()).map(|i| format!("?{}", i)).collect();
            let in_clause = placeholders.join(", ");

            let mut params: Vec<&dyn rusqlite::types::ToSql> = vec![&receiver_id, &read_at];
            params.extend(message_ids.iter().map(|id| id as &dyn rusqlite::types::ToSql));

            conn.execute(
                &format!(
                    "UPDATE messages SET read_at = ?2
                     WHERE receiver_id = ?1 AND read_at IS NULL AND id IN ({in_clause})"
                ),
                params.as_slice(),
            )?;

            let mut stmt = conn.prepare(&format!(
                "{MESSAGE_COLUMNS} WHERE read_at = ?2 AND receiver_id = ?1 AND id IN ({in_clause})"
            ))?;
            let rows = stmt
                .query_map(params.as_slice(), map_message_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

const MESSAGE_COLUMNS: &str =
    "SELECT id, sender_id, receiver_id, body, original_body, sent_at, read_at, edited_at
     FROM messages";

fn map_message_row(row: &rusqlite::Row<'_>) -> std::result::Result<MessageRow, rusqlite::Error> {
    Ok(MessageRow {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        receiver_id: row.get(2)?,
        body: row.get(3)?,
        original_body: row.get(4)?,
        sent_at: row.get(5)?,
        read_at: row.get(6)?,
        edited_at: row.get(7)?,
    })
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, username, password, role, approved, created_at FROM users WHERE {column} = ?1"
    ))?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
                role: row.get(3)?,
                approved: row.get(4)?,
                created_at: row.get(5)?,
            })
        })
        .optional()?;

    Ok(row)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
