use std::sync::Arc;

use anyhow::Context;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{info, warn};

use guestbook_db::Database;
use guestbook_types::api::{Claims, LoginRequest, RegisterRequest, TokenResponse};

use crate::cache::{CachePolicy, ReplyListCache};
use crate::error::{ApiError, FieldErrors, run_blocking};
use crate::extract::JsonBody;
use crate::replies::ReplyStore;
use crate::validate;

const EMAIL_TAKEN: &str = "The email has already been taken.";

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub replies: ReplyStore,
    pub auth: AuthConfig,
}

impl AppStateInner {
    pub fn new(db: Arc<Database>, auth: AuthConfig, cache_policy: CachePolicy) -> AppState {
        let replies = ReplyStore::new(db.clone(), ReplyListCache::new(cache_policy));
        Arc::new(Self { db, replies, auth })
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    /// Registrations with one of these emails are created as admins.
    pub admin_emails: Vec<String>,
}

impl AuthConfig {
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails.iter().any(|e| e.eq_ignore_ascii_case(email))
    }
}

pub async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let mut errors = FieldErrors::new();
    let name = validate::required(&mut errors, "name", req.name.as_deref());
    let email = validate::email(&mut errors, "email", req.email.as_deref());
    let password = validate::password(&mut errors, "password", req.password.as_deref());

    if let Some(email) = &email {
        let db = state.db.clone();
        let lookup = email.clone();
        if run_blocking(move || db.get_user_by_email(&lookup)).await?.is_some() {
            errors.add("email", EMAIL_TAKEN);
        }
    }
    errors.into_result()?;

    let (Some(name), Some(email), Some(password)) = (name, email, password) else {
        return Err(anyhow::anyhow!("validated register fields missing").into());
    };

    // Argon2 is CPU-heavy
    let password_hash = run_blocking(move || hash_password(&password)).await?;

    let is_admin = state.auth.is_admin_email(&email);
    let db = state.db.clone();
    let created =
        run_blocking(move || db.try_create_user(&name, &email, &password_hash, is_admin)).await?;
    let user_id = created_or_taken(created)?;

    info!("Registered user {} (admin: {})", user_id, is_admin);

    let token = create_token(&state.auth, user_id)?;
    Ok(Json(TokenResponse { token }))
}

/// A concurrent registration can pass the pre-check too; the UNIQUE index
/// settles it.
fn created_or_taken(created: Option<i64>) -> Result<i64, ApiError> {
    created.ok_or_else(|| {
        let mut errors = FieldErrors::new();
        errors.add("email", EMAIL_TAKEN);
        ApiError::Validation(errors)
    })
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let mut errors = FieldErrors::new();
    let email = validate::required(&mut errors, "email", req.email.as_deref());
    let password = validate::required(&mut errors, "password", req.password.as_deref());
    errors.into_result()?;

    let (Some(email), Some(password)) = (email, password) else {
        return Err(anyhow::anyhow!("validated login fields missing").into());
    };

    let db = state.db.clone();
    let user = run_blocking(move || db.get_user_by_email(&email))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    let stored = user.password.clone();
    let verified = run_blocking(move || verify_password(&password, &stored)).await?;
    if !verified {
        warn!("Failed login for user {}", user.id);
        return Err(ApiError::Unauthorized);
    }

    let token = create_token(&state.auth, user.id)?;
    Ok(Json(TokenResponse { token }))
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

/// `Ok(false)` on a wrong password; `Err` only when the stored hash is unreadable.
pub fn verify_password(password: &str, stored_hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| anyhow::anyhow!("stored password hash is invalid: {}", e))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub fn create_token(auth: &AuthConfig, user_id: i64) -> anyhow::Result<String> {
    let expires_at = chrono::Utc::now()
        .checked_add_signed(auth.token_ttl)
        .context("token expiry is out of range")?;
    let claims = Claims {
        sub: user_id.to_string(),
        exp: expires_at.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(auth.jwt_secret.as_bytes()),
    )?;

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn unreadable_hash_is_an_error() {
        assert!(verify_password("anything", "not-a-phc-string").is_err());
    }

    fn auth_config(token_ttl: chrono::Duration) -> AuthConfig {
        AuthConfig {
            jwt_secret: "secret".into(),
            token_ttl,
            admin_emails: vec![],
        }
    }

    #[test]
    fn token_carries_subject_and_expiry() {
        let token = create_token(&auth_config(chrono::Duration::days(1)), 42).unwrap();
        let data = jsonwebtoken::decode::<Claims>(
            &token,
            &jsonwebtoken::DecodingKey::from_secret(b"secret"),
            &jsonwebtoken::Validation::default(),
        )
        .unwrap();
        assert_eq!(data.claims.sub, "42");
        assert!(data.claims.exp as i64 > chrono::Utc::now().timestamp());
    }

    #[test]
    fn unrepresentable_expiry_is_an_error() {
        let ttl = chrono::Duration::try_days(100_000_000).unwrap();
        assert!(create_token(&auth_config(ttl), 1).is_err());
    }

    #[test]
    fn lost_registration_race_is_a_validation_error() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("Alice", "alice@example.com", "hash", false).unwrap();

        let created = db.try_create_user("Alice", "alice@example.com", "hash", false).unwrap();
        match created_or_taken(created) {
            Err(ApiError::Validation(errors)) => assert!(errors.contains("email")),
            other => panic!("expected an email error, got {:?}", other),
        }
    }

    #[test]
    fn admin_emails_match_case_insensitively() {
        let auth = AuthConfig {
            jwt_secret: "secret".into(),
            token_ttl: chrono::Duration::days(1),
            admin_emails: vec!["Root@Example.com".into()],
        };
        assert!(auth.is_admin_email("root@example.com"));
        assert!(!auth.is_admin_email("user@example.com"));
    }
}
