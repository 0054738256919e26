#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use guestbook_api::auth::{AppState, AppStateInner, AuthConfig, create_token};
use guestbook_api::cache::CachePolicy;
use guestbook_api::router::app;
use guestbook_db::Database;

pub struct TestUser {
    pub id: i64,
    pub token: String,
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let db = Arc::new(Database::open_in_memory().expect("open db"));
        let auth = AuthConfig {
            jwt_secret: "test-secret".into(),
            token_ttl: chrono::Duration::days(1),
            admin_emails: vec!["root@example.com".into()],
        };
        let state = AppStateInner::new(db, auth, CachePolicy::default());
        let router = app(state.clone());
        Self { state, router }
    }

    pub fn db(&self) -> &Database {
        &self.state.db
    }

    /// Inserts a user directly and issues a token for it.
    pub fn user(&self, name: &str, is_admin: bool) -> TestUser {
        let email = format!("{}@example.com", name.to_lowercase());
        let id = self
            .db()
            .create_user(name, &email, "unused-hash", is_admin)
            .expect("create user");
        let token = create_token(&self.state.auth, id).expect("token");
        TestUser { id, token }
    }

    pub fn message(&self, owner: &TestUser, text: &str) -> i64 {
        self.db().insert_message(owner.id, text).expect("insert message")
    }

    pub fn reply(&self, message_id: i64, author: &TestUser, text: &str) -> i64 {
        self.db()
            .insert_reply(message_id, author.id, text)
            .expect("insert reply")
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let request = builder.body(body).expect("build request");

        let response = self.router.clone().oneshot(request).await.expect("router call");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("read body")
            .to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, user: &TestUser, body: Option<Value>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(&user.token), body).await
    }

    pub async fn post(&self, uri: &str, user: &TestUser, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(&user.token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, user: &TestUser, body: Value) -> (StatusCode, Value) {
        self.send(Method::PUT, uri, Some(&user.token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, user: &TestUser, body: Option<Value>) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, Some(&user.token), body).await
    }
}

/// Number of elements in `json[key]`, or `None` when it is not an array.
pub fn count(json: &Value, key: &str) -> Option<usize> {
    json.get(key).and_then(Value::as_array).map(Vec::len)
}

pub fn has_error(json: &Value, field: &str) -> bool {
    json["errors"].get(field).is_some()
}
