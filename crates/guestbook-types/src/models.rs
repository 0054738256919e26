use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Public shape of a message. Archived messages never reach this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResource {
    pub id: i64,
    pub user_id: i64,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyResource {
    pub id: i64,
    pub message_id: i64,
    /// Author of the reply.
    pub user_id: i64,
    pub reply: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
