use std::error::Error as _;

use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    http::StatusCode,
};
use http_body_util::LengthLimitError;
use serde::de::DeserializeOwned;

use crate::error::{ApiError, FieldErrors};

/// Largest request body any route buffers.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// JSON body extractor that treats an empty body as `T::default()` and
/// reports malformed JSON as a validation failure instead of a bare 4xx.
/// Content-Type is not checked.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Default + Send,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state).await.map_err(|e| {
            if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                ApiError::PayloadTooLarge
            } else {
                malformed(e.body_text())
            }
        })?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(T::default()));
        }

        serde_json::from_slice(&bytes)
            .map(Self)
            .map_err(|e| malformed(e.to_string()))
    }
}

fn malformed(reason: String) -> ApiError {
    let mut errors = FieldErrors::new();
    errors.add("body", reason);
    ApiError::Validation(errors)
}

/// Maps a failed body read: a body over the limit is the client's fault,
/// anything else is internal.
pub fn body_read_error(err: axum::Error) -> ApiError {
    let over_limit = err
        .source()
        .is_some_and(|source| source.is::<LengthLimitError>());
    if over_limit {
        ApiError::PayloadTooLarge
    } else {
        anyhow::anyhow!("failed to buffer request body: {}", err).into()
    }
}
