use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

/// Per-field validation messages, serialized as `{"field": ["msg", ...]}`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[cfg(test)]
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// `Ok(())` when nothing was recorded, otherwise a validation failure.
    pub fn into_result(self) -> Result<(), ApiError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self))
        }
    }
}

/// Every failure a request can end in.
///
/// Absence and lack of permission share [`ApiError::NotFound`] so a caller
/// cannot probe for records it does not own.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("the given data was invalid")]
    Validation(FieldErrors),

    #[error("{0}")]
    PreconditionRequired(&'static str),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("unauthenticated")]
    Unauthorized,

    #[error("request body too large")]
    PayloadTooLarge,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn message_not_found() -> Self {
        Self::NotFound("Message not found.")
    }

    pub fn reply_not_found() -> Self {
        Self::NotFound("Message reply not found")
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::PreconditionRequired(_) => StatusCode::EXPECTATION_FAILED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::Validation(errors) => json!({
                "message": "The given data was invalid.",
                "errors": errors.0,
            }),
            Self::PreconditionRequired(msg) | Self::NotFound(msg) => json!({ "message": msg }),
            Self::Unauthorized => json!({ "message": "Unauthenticated." }),
            Self::PayloadTooLarge => json!({ "message": "The request body is too large." }),
            Self::Internal(err) => {
                error!("Request failed: {:#}", err);
                json!({ "message": "Server Error" })
            }
        };
        (status, Json(body)).into_response()
    }
}

/// Runs blocking database work off the async runtime.
pub async fn run_blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {}", e))?
        .map_err(ApiError::from)
}
