//! Message access guard.
//!
//! Every `/replies/*` request passes through [`require_message`] before its
//! handler: the `message_id` must be supplied, and the message must be
//! reachable by the actor. Only then do the reply handlers run.

use std::collections::HashMap;

use axum::{
    Extension,
    body::{Body, to_bytes},
    extract::{Query, Request, State},
    http::Uri,
    middleware::Next,
    response::Response,
};
use serde_json::Value;
use tracing::debug;

use guestbook_db::Database;

use crate::auth::AppState;
use crate::error::{ApiError, run_blocking};
use crate::extract::{MAX_BODY_BYTES, body_read_error};

pub const MESSAGE_REQUIRED: &str = "Specifying the message is required for this endpoint.";

/// The authenticated identity behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: i64,
    pub is_admin: bool,
}

/// Outcome of the guard. `Denied` carries nothing, so a missing message and
/// someone else's message are indistinguishable to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageAccess {
    Granted,
    Denied,
}

/// A message the guard admitted for this request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageScope {
    pub message_id: i64,
}

/// Admins reach any live message; everyone else only their own.
pub fn can_access_message(db: &Database, actor: &Actor, message_id: i64) -> anyhow::Result<MessageAccess> {
    let reachable = if actor.is_admin {
        db.message_exists(message_id)?
    } else {
        db.message_owned_by(message_id, actor.id)?
    };

    Ok(if reachable {
        MessageAccess::Granted
    } else {
        MessageAccess::Denied
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MessageIdInput {
    Missing,
    /// Present but not an id; no message can match it.
    Invalid,
    Id(i64),
}

fn parse_id(value: &Value) -> MessageIdInput {
    let id = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    id.map_or(MessageIdInput::Invalid, MessageIdInput::Id)
}

/// Looks for `message_id` in a JSON object body first, then in the query
/// string. A body value wins when both are present.
fn find_message_id(uri: &Uri, body: &[u8]) -> MessageIdInput {
    if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(body) {
        if let Some(value) = map.get("message_id") {
            return parse_id(value);
        }
    }

    match Query::<HashMap<String, String>>::try_from_uri(uri) {
        Ok(Query(params)) => params
            .get("message_id")
            .map_or(MessageIdInput::Missing, |raw| parse_id(&Value::String(raw.clone()))),
        Err(_) => MessageIdInput::Missing,
    }
}

pub async fn require_message(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (parts, body) = req.into_parts();
    let bytes = to_bytes(body, MAX_BODY_BYTES).await.map_err(body_read_error)?;

    let message_id = match find_message_id(&parts.uri, &bytes) {
        MessageIdInput::Missing => return Err(ApiError::PreconditionRequired(MESSAGE_REQUIRED)),
        MessageIdInput::Invalid => return Err(ApiError::message_not_found()),
        MessageIdInput::Id(id) => id,
    };

    let db = state.db.clone();
    let access = run_blocking(move || can_access_message(&db, &actor, message_id)).await?;
    if access == MessageAccess::Denied {
        debug!("User {} denied access to message {}", actor.id, message_id);
        return Err(ApiError::message_not_found());
    }

    let mut req = Request::from_parts(parts, Body::from(bytes));
    req.extensions_mut().insert(MessageScope { message_id });
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    #[test]
    fn message_id_from_query() {
        assert_eq!(
            find_message_id(&uri("/replies/list?message_id=12"), b""),
            MessageIdInput::Id(12)
        );
        assert_eq!(
            find_message_id(&uri("/replies/list?message_id=abc"), b""),
            MessageIdInput::Invalid
        );
    }

    #[test]
    fn message_id_from_body() {
        let u = uri("/replies/add");
        assert_eq!(find_message_id(&u, br#"{"message_id": 4}"#), MessageIdInput::Id(4));
        assert_eq!(find_message_id(&u, br#"{"message_id": "4"}"#), MessageIdInput::Id(4));
        assert_eq!(find_message_id(&u, br#"{"message_id": null}"#), MessageIdInput::Invalid);
        assert_eq!(find_message_id(&u, br#"{"message_id": 1.5}"#), MessageIdInput::Invalid);
    }

    #[test]
    fn body_message_id_wins_over_query() {
        let u = uri("/replies/list?message_id=12");
        assert_eq!(find_message_id(&u, br#"{"message_id": 4}"#), MessageIdInput::Id(4));
        assert_eq!(find_message_id(&u, br#"{"message_id": "x"}"#), MessageIdInput::Invalid);
        assert_eq!(find_message_id(&u, br#"{"reply": "hi"}"#), MessageIdInput::Id(12));
    }

    #[test]
    fn missing_message_id() {
        let u = uri("/replies/add");
        assert_eq!(find_message_id(&u, b""), MessageIdInput::Missing);
        assert_eq!(find_message_id(&u, br#"{"reply": "hi"}"#), MessageIdInput::Missing);
        assert_eq!(find_message_id(&u, b"not json"), MessageIdInput::Missing);
        assert_eq!(find_message_id(&uri("/replies/list?other=1"), b""), MessageIdInput::Missing);
    }

    #[test]
    fn owners_and_admins_reach_messages() {
        let db = Database::open_in_memory().unwrap();
        let owner = db.create_user("Owner", "owner@example.com", "hash", false).unwrap();
        let other = db.create_user("Other", "other@example.com", "hash", false).unwrap();
        let admin = db.create_user("Admin", "admin@example.com", "hash", true).unwrap();
        let message = db.insert_message(owner, "Hello").unwrap();

        let owner = Actor { id: owner, is_admin: false };
        let other = Actor { id: other, is_admin: false };
        let admin = Actor { id: admin, is_admin: true };

        assert_eq!(can_access_message(&db, &owner, message).unwrap(), MessageAccess::Granted);
        assert_eq!(can_access_message(&db, &admin, message).unwrap(), MessageAccess::Granted);
        assert_eq!(can_access_message(&db, &other, message).unwrap(), MessageAccess::Denied);

        // Missing messages look exactly like someone else's.
        assert_eq!(can_access_message(&db, &owner, message + 1).unwrap(), MessageAccess::Denied);
        assert_eq!(can_access_message(&db, &admin, message + 1).unwrap(), MessageAccess::Denied);
    }

    #[test]
    fn archived_messages_are_unreachable() {
        let db = Database::open_in_memory().unwrap();
        let owner = db.create_user("Owner", "owner@example.com", "hash", false).unwrap();
        let message = db.insert_message(owner, "Hello").unwrap();
        db.archive_owned_message(message, owner).unwrap();

        let admin = Actor { id: 0, is_admin: true };
        assert_eq!(can_access_message(&db, &admin, message).unwrap(), MessageAccess::Denied);
    }
}
