use serde::{Deserialize, Serialize};

use crate::models::{MessageResource, ReplyResource};

// -- JWT Claims --

/// Bearer token claims. `sub` is the user id in decimal; the admin flag is
/// not carried in the token so a demotion takes effect on the next request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

// -- Messages --

/// Body of `/messages/add` and `/messages/update/{id}`. Fields are optional at
/// the wire level so a missing field surfaces as a validation error rather
/// than a deserialization failure.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MessageRequest {
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StoreMessageResponse {
    pub message_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageListResponse {
    pub messages: Vec<MessageResource>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShowMessageResponse {
    pub message: MessageResource,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageUpdatedResponse {
    pub message_updated: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageDeletedResponse {
    pub message_deleted: usize,
}

// -- Replies --

/// Body of `/replies/add` and `/replies/update/{reply_id}`. The `message_id`
/// field is consumed by the message guard before the handler runs.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReplyRequest {
    pub reply: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StoreReplyResponse {
    pub reply_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReplyListResponse {
    pub replies: Vec<ReplyResource>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReplyUpdatedResponse {
    pub reply_updated: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReplyDeletedResponse {
    pub reply_deleted: usize,
}
