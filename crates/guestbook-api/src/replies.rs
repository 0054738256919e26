use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use tracing::info;

use guestbook_db::Database;
use guestbook_types::api::{
    ReplyDeletedResponse, ReplyListResponse, ReplyRequest, ReplyUpdatedResponse, StoreReplyResponse,
};

use crate::auth::AppState;
use crate::cache::{ReplyList, ReplyListCache};
use crate::convert::reply_resource;
use crate::error::{ApiError, FieldErrors, run_blocking};
use crate::extract::JsonBody;
use crate::guard::{Actor, MessageScope};
use crate::validate;

/// Replies of a message, with the list cache in front of reads.
///
/// Callers must have passed the message guard for `message_id` already. Each
/// successful write invalidates the cached list after the row is committed.
pub struct ReplyStore {
    db: Arc<Database>,
    cache: ReplyListCache,
}

impl ReplyStore {
    pub fn new(db: Arc<Database>, cache: ReplyListCache) -> Self {
        Self { db, cache }
    }

    pub fn cache(&self) -> &ReplyListCache {
        &self.cache
    }

    pub fn create(&self, actor: &Actor, message_id: i64, reply: &str) -> anyhow::Result<i64> {
        let id = self.db.insert_reply(message_id, actor.id, reply)?;
        self.cache.invalidate(message_id);
        Ok(id)
    }

    pub fn list(&self, message_id: i64) -> anyhow::Result<ReplyList> {
        self.cache
            .get_or_compute(message_id, || self.db.list_replies(message_id))
    }

    /// Returns the affected-row count; zero means no live reply with that id
    /// under `message_id`.
    pub fn update(&self, message_id: i64, reply_id: i64, reply: &str) -> anyhow::Result<usize> {
        let changed = self.db.update_reply(message_id, reply_id, reply)?;
        if changed > 0 {
            self.cache.invalidate(message_id);
        }
        Ok(changed)
    }

    pub fn archive(&self, message_id: i64, reply_id: i64) -> anyhow::Result<usize> {
        let changed = self.db.archive_reply(message_id, reply_id)?;
        if changed > 0 {
            self.cache.invalidate(message_id);
        }
        Ok(changed)
    }
}

fn validated_reply(req: ReplyRequest) -> Result<String, ApiError> {
    let mut errors = FieldErrors::new();
    let reply = validate::required(&mut errors, "reply", req.reply.as_deref());
    errors.into_result()?;
    reply.ok_or_else(|| anyhow::anyhow!("validated reply missing").into())
}

/// POST /replies/add
pub async fn store(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(scope): Extension<MessageScope>,
    JsonBody(req): JsonBody<ReplyRequest>,
) -> Result<Json<StoreReplyResponse>, ApiError> {
    let reply = validated_reply(req)?;

    let reply_id =
        run_blocking(move || state.replies.create(&actor, scope.message_id, &reply)).await?;

    info!("User {} replied {} on message {}", actor.id, reply_id, scope.message_id);
    Ok(Json(StoreReplyResponse { reply_id }))
}

/// GET /replies/list
pub async fn list(
    State(state): State<AppState>,
    Extension(scope): Extension<MessageScope>,
) -> Result<Json<ReplyListResponse>, ApiError> {
    let replies = run_blocking(move || state.replies.list(scope.message_id)).await?;

    Ok(Json(ReplyListResponse {
        replies: replies.iter().map(reply_resource).collect(),
    }))
}

/// PUT /replies/update/{reply_id}
pub async fn update(
    State(state): State<AppState>,
    Path(reply_id): Path<i64>,
    Extension(scope): Extension<MessageScope>,
    JsonBody(req): JsonBody<ReplyRequest>,
) -> Result<Json<ReplyUpdatedResponse>, ApiError> {
    let reply = validated_reply(req)?;

    let changed =
        run_blocking(move || state.replies.update(scope.message_id, reply_id, &reply)).await?;
    if changed == 0 {
        return Err(ApiError::reply_not_found());
    }

    Ok(Json(ReplyUpdatedResponse { reply_updated: changed }))
}

/// DELETE /replies/archive/{reply_id}
pub async fn archive(
    State(state): State<AppState>,
    Path(reply_id): Path<i64>,
    Extension(scope): Extension<MessageScope>,
) -> Result<Json<ReplyDeletedResponse>, ApiError> {
    let changed = run_blocking(move || state.replies.archive(scope.message_id, reply_id)).await?;
    if changed == 0 {
        return Err(ApiError::reply_not_found());
    }

    info!("Reply {} on message {} archived", reply_id, scope.message_id);
    Ok(Json(ReplyDeletedResponse { reply_deleted: changed }))
}
