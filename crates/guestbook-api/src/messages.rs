use axum::{
    Extension, Json,
    extract::{Path, State},
};
use tracing::info;

use guestbook_types::api::{
    MessageDeletedResponse, MessageListResponse, MessageRequest, MessageUpdatedResponse,
    ShowMessageResponse, StoreMessageResponse,
};

use crate::auth::AppState;
use crate::convert::message_resource;
use crate::error::{ApiError, FieldErrors, run_blocking};
use crate::extract::JsonBody;
use crate::guard::Actor;
use crate::validate;

// Single-message reads and writes are owner-only, admins included. Only
// listing everything is an admin privilege.

fn validated_message(req: MessageRequest) -> Result<String, ApiError> {
    let mut errors = FieldErrors::new();
    let message = validate::required(&mut errors, "message", req.message.as_deref());
    errors.into_result()?;
    message.ok_or_else(|| anyhow::anyhow!("validated message missing").into())
}

/// POST /messages/add
pub async fn store(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    JsonBody(req): JsonBody<MessageRequest>,
) -> Result<Json<StoreMessageResponse>, ApiError> {
    let message = validated_message(req)?;

    let message_id = run_blocking(move || state.db.insert_message(actor.id, &message)).await?;

    info!("User {} posted message {}", actor.id, message_id);
    Ok(Json(StoreMessageResponse { message_id }))
}

/// GET /messages/list
pub async fn list(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<MessageListResponse>, ApiError> {
    let rows = run_blocking(move || state.db.list_messages_by_user(actor.id)).await?;

    Ok(Json(MessageListResponse {
        messages: rows.iter().map(message_resource).collect(),
    }))
}

/// GET /messages/list-all. Admin only, enforced by the route layer.
pub async fn list_all(State(state): State<AppState>) -> Result<Json<MessageListResponse>, ApiError> {
    let rows = run_blocking(move || state.db.list_all_messages()).await?;

    Ok(Json(MessageListResponse {
        messages: rows.iter().map(message_resource).collect(),
    }))
}

/// GET /messages/show/{id}
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<ShowMessageResponse>, ApiError> {
    let row = run_blocking(move || state.db.get_owned_message(id, actor.id))
        .await?
        .ok_or_else(ApiError::message_not_found)?;

    Ok(Json(ShowMessageResponse {
        message: message_resource(&row),
    }))
}

/// PUT /messages/update/{id}
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(actor): Extension<Actor>,
    JsonBody(req): JsonBody<MessageRequest>,
) -> Result<Json<MessageUpdatedResponse>, ApiError> {
    let message = validated_message(req)?;

    let changed =
        run_blocking(move || state.db.update_owned_message(id, actor.id, &message)).await?;
    if changed == 0 {
        return Err(ApiError::message_not_found());
    }

    Ok(Json(MessageUpdatedResponse { message_updated: changed }))
}

/// DELETE /messages/archive/{id}
pub async fn archive(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<MessageDeletedResponse>, ApiError> {
    let changed = run_blocking(move || state.db.archive_owned_message(id, actor.id)).await?;
    if changed == 0 {
        return Err(ApiError::message_not_found());
    }

    info!("User {} archived message {}", actor.id, id);
    Ok(Json(MessageDeletedResponse { message_deleted: changed }))
}
