pub mod accounts;
pub mod error;
pub mod github;
pub mod health;
pub mod hours;
pub mod mask;
pub mod oauth;
pub mod rate_limit;
pub mod validate;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use chrono::{DateTime, Utc};
use tracing::{error, warn};

use tally_db::Database;

use crate::error::ApiError;
use crate::github::GithubClient;
use crate::rate_limit::RateLimiter;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub github: GithubClient,
    /// 5 requests / 300 s per identity on the linking start endpoint.
    pub oauth_limiter: RateLimiter,
    /// 10 requests / 60 s per identity on the command-surface routes.
    pub command_limiter: RateLimiter,
    /// Public base URL this server is reachable at; the OAuth redirect URI
    /// is `{public_base_url}/oauth/callback`.
    pub public_base_url: String,
    pub state_ttl_secs: u64,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health))
        .route("/oauth/start", get(oauth::oauth_start))
        .route("/oauth/callback", get(oauth::oauth_callback))
        .route(
            "/users/{discord_id}",
            get(accounts::link_status).delete(accounts::unlink),
        )
        .route("/users/{discord_id}/commits", get(accounts::recent_commits))
        .route(
            "/users/{discord_id}/hours",
            post(hours::log_hours).get(hours::history),
        )
        .route("/users/{discord_id}/hours/export", get(hours::export_csv))
        .with_state(state)
}

/// Shared gate for the command-surface routes: rate limit first, then
/// identity format.
pub(crate) fn check_command_access(state: &AppState, discord_id: &str) -> Result<(), ApiError> {
    state.command_limiter.check(discord_id)?;
    if !validate::discord_id(discord_id) {
        warn!("Invalid Discord ID: {}", mask::hash_preview(discord_id));
        return Err(ApiError::Validation("Discord ID"));
    }
    Ok(())
}

/// Run blocking rusqlite work off the async runtime.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {e}");
            ApiError::Internal(anyhow::anyhow!("task join failed: {e}"))
        })?
        .map_err(|e| {
            error!("Database error: {e:#}");
            ApiError::Internal(e)
        })
}

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
/// Parse as naive UTC and convert; fall back noisily on corrupt values.
pub(crate) fn parse_db_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}
