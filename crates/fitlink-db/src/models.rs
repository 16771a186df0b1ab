/// Raw rows as stored in SQLite. Timestamps stay strings here; parsing into
/// `chrono` types happens at the API boundary.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub role: String,
    pub approved: bool,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub body: String,
    pub original_body: Option<String>,
    pub sent_at: String,
    pub read_at: Option<String>,
    pub edited_at: Option<String>,
}
