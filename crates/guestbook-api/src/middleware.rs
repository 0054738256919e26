use axum::{
    Extension,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::warn;

use guestbook_types::api::Claims;

use crate::auth::AppState;
use crate::error::{ApiError, run_blocking};
use crate::guard::Actor;

/// Validates the bearer token and attaches the current [`Actor`].
///
/// The user row is re-read on every request so a deleted user or a changed
/// admin flag takes effect immediately.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or(ApiError::Unauthorized)?;

    let token_data = decode::<Claims>(
        bearer.token(),
        &DecodingKey::from_secret(state.auth.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        warn!("Rejected bearer token: {}", e);
        ApiError::Unauthorized
    })?;

    let user_id: i64 = token_data.claims.sub.parse().map_err(|_| {
        warn!("Bearer token has a non-numeric subject");
        ApiError::Unauthorized
    })?;

    let db = state.db.clone();
    let user = run_blocking(move || db.get_user_by_id(user_id))
        .await?
        .ok_or_else(|| {
            warn!("Token for unknown user {}", user_id);
            ApiError::Unauthorized
        })?;

    req.extensions_mut().insert(Actor {
        id: user.id,
        is_admin: user.is_admin,
    });
    Ok(next.run(req).await)
}

/// Admits admins only. Must run after [`require_auth`].
pub async fn require_admin(
    Extension(actor): Extension<Actor>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !actor.is_admin {
        warn!("Non-admin user {} hit an admin route", actor.id);
        return Err(ApiError::Unauthorized);
    }
    Ok(next.run(req).await)
}
