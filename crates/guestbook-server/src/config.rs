use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use guestbook_api::auth::AuthConfig;
use guestbook_api::cache::CachePolicy;

/// Placeholder JWT secrets that should never reach production.
pub const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

const DEFAULT_SECRET: &str = "dev-secret-change-me";

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub auth: AuthConfig,
    pub cache: CachePolicy,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests need not touch the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let host = var("GUESTBOOK_HOST", "0.0.0.0");
        let port: u16 = var("GUESTBOOK_PORT", "3000")
            .parse()
            .context("GUESTBOOK_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        let token_ttl_days: u32 = var("GUESTBOOK_TOKEN_TTL_DAYS", "30")
            .parse()
            .context("GUESTBOOK_TOKEN_TTL_DAYS must be a whole number of days")?;
        anyhow::ensure!(token_ttl_days > 0, "GUESTBOOK_TOKEN_TTL_DAYS must be at least 1");
        // Expiry timestamps must stay representable for every token issued.
        let token_ttl = chrono::Duration::try_days(i64::from(token_ttl_days))
            .filter(|ttl| chrono::Utc::now().checked_add_signed(*ttl).is_some())
            .context("GUESTBOOK_TOKEN_TTL_DAYS is out of range")?;

        let admin_emails = lookup("GUESTBOOK_ADMIN_EMAILS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let max_entries = lookup("GUESTBOOK_REPLY_CACHE_MAX_ENTRIES")
            .map(|v| v.parse::<usize>())
            .transpose()
            .context("GUESTBOOK_REPLY_CACHE_MAX_ENTRIES must be a number")?;
        let ttl = lookup("GUESTBOOK_REPLY_CACHE_TTL_SECS")
            .map(|v| v.parse::<u64>().map(Duration::from_secs))
            .transpose()
            .context("GUESTBOOK_REPLY_CACHE_TTL_SECS must be a number of seconds")?;

        Ok(Self {
            addr,
            db_path: var("GUESTBOOK_DB_PATH", "guestbook.db").into(),
            auth: AuthConfig {
                jwt_secret: var("GUESTBOOK_JWT_SECRET", DEFAULT_SECRET),
                token_ttl,
                admin_emails,
            },
            cache: CachePolicy { max_entries, ttl },
        })
    }

    pub fn uses_placeholder_secret(&self) -> bool {
        PLACEHOLDER_SECRETS.contains(&self.auth.jwt_secret.as_str())
    }
}
