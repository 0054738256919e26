use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
};
use serde_json::{Value, json};

use crate::auth::{self, AppState};
use crate::extract::MAX_BODY_BYTES;
use crate::guard::require_message;
use crate::messages;
use crate::middleware::{require_admin, require_auth};
use crate::replies;

/// Builds the full API. Layers are attached with `route_layer` so unknown
/// paths still answer 404 rather than 401.
pub fn app(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/register", post(auth::register))
        .route("/health", get(health));

    let message_routes = Router::new()
        .route("/messages/add", post(messages::store))
        .route("/messages/list", get(messages::list))
        .route(
            "/messages/list-all",
            get(messages::list_all).route_layer(middleware::from_fn(require_admin)),
        )
        .route("/messages/show/{id}", get(messages::show))
        .route("/messages/update/{id}", put(messages::update))
        .route("/messages/archive/{id}", delete(messages::archive));

    // Every reply route sits behind the message guard
    let reply_routes = Router::new()
        .route("/replies/add", post(replies::store))
        .route("/replies/list", get(replies::list))
        .route("/replies/update/{reply_id}", put(replies::update))
        .route("/replies/archive/{reply_id}", delete(replies::archive))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_message));

    let protected_routes = Router::new()
        .merge(message_routes)
        .merge(reply_routes)
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        // The message guard buffers bodies under the same limit
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
