use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

use guestbook_db::models::{MessageRow, ReplyRow};
use guestbook_types::models::{MessageResource, ReplyResource};

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone; parse
/// as naive UTC, falling back to RFC 3339.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|ndt| ndt.and_utc())
        .or_else(|_| raw.parse::<DateTime<Utc>>())
        .ok()
}

fn timestamp_or_default(raw: &str, column: &str, table: &str, id: i64) -> DateTime<Utc> {
    parse_timestamp(raw).unwrap_or_else(|| {
        warn!("Corrupt {} '{}' on {} {}", column, raw, table, id);
        DateTime::default()
    })
}

pub fn message_resource(row: &MessageRow) -> MessageResource {
    MessageResource {
        id: row.id,
        user_id: row.user_id,
        message: row.message.clone(),
        created_at: timestamp_or_default(&row.created_at, "created_at", "message", row.id),
        updated_at: timestamp_or_default(&row.updated_at, "updated_at", "message", row.id),
    }
}

/// `user_id` is the reply's author, not the parent message's owner.
pub fn reply_resource(row: &ReplyRow) -> ReplyResource {
    ReplyResource {
        id: row.id,
        message_id: row.message_id,
        user_id: row.user_id,
        reply: row.reply.clone(),
        created_at: timestamp_or_default(&row.created_at, "created_at", "reply", row.id),
        updated_at: timestamp_or_default(&row.updated_at, "updated_at", "reply", row.id),
    }
}
