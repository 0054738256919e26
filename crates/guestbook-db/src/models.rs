/// Row types for the guestbook tables.
/// Distinct from guestbook-types resources to keep the DB layer independent.
/// Timestamps are SQLite `datetime('now')` strings (UTC, no offset).

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password: String,
    pub is_admin: bool,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: i64,
    pub user_id: i64,
    pub message: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct ReplyRow {
    pub id: i64,
    pub message_id: i64,
    pub user_id: i64,
    pub reply: String,
    pub created_at: String,
    pub updated_at: String,
}
