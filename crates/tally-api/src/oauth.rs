//! The account-linking flow: `start` issues a single-use state token and
//! the authorize URL; `complete` consumes the token and persists the link.

use axum::extract::{Query, State};
use axum::response::Redirect;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::{AppState, blocking, mask, validate};

#[derive(Debug, Deserialize)]
pub struct StartQuery {
    pub discord_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
}

/// 32 bytes from a cryptographically secure RNG, URL-safe base64 encoded
/// (43 characters, well past the 20-character validator floor).
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Rate-limit and validate the identity, persist a pending state token,
/// and return the authorization URL to redirect the user to.
pub async fn start_flow(state: &AppState, discord_id: &str) -> Result<String, ApiError> {
    state.oauth_limiter.check(discord_id)?;

    if !validate::discord_id(discord_id) {
        warn!(
            "Invalid Discord ID in OAuth start: {}",
            mask::hash_preview(discord_id)
        );
        return Err(ApiError::Validation("Discord ID"));
    }

    let token = generate_state();

    let db = state.clone();
    let stored_token = token.clone();
    let id = discord_id.to_string();
    blocking(move || db.db.create_oauth_state(&stored_token, &id)).await?;

    let redirect_uri = format!("{}/oauth/callback", state.public_base_url);
    let url = state.github.authorize_url(&redirect_uri, &token)?;

    info!("OAuth started for Discord ID: {}", mask::hash_preview(discord_id));
    Ok(url)
}

/// Complete the flow from the provider callback. The state token is
/// consumed atomically before any network call, so a duplicate callback
/// (or a replay) fails with the same generic outcome as an expired token.
pub async fn complete_flow(
    state: &AppState,
    code: &str,
    state_token: &str,
) -> Result<String, ApiError> {
    if !validate::oauth_state(state_token) {
        warn!("Invalid state format: {}", mask::hash_preview(state_token));
        return Err(ApiError::Validation("state parameter"));
    }

    info!(
        "OAuth callback received - code: {}, state: {}",
        mask::hash_preview(code),
        mask::hash_preview(state_token)
    );

    let db = state.clone();
    let token = state_token.to_string();
    let ttl = state.state_ttl_secs;
    let discord_id = blocking(move || db.db.consume_oauth_state(&token, ttl))
        .await?
        .ok_or_else(|| {
            warn!("Invalid state: {}", mask::hash_preview(state_token));
            ApiError::InvalidState
        })?;

    // The identity came back out of storage; re-validate before use.
    if !validate::discord_id(&discord_id) {
        warn!(
            "Invalid Discord ID from state: {}",
            mask::hash_preview(&discord_id)
        );
        return Err(ApiError::Validation("Discord ID"));
    }

    let redirect_uri = format!("{}/oauth/callback", state.public_base_url);
    let access_token = state.github.exchange_code(code, &redirect_uri).await?;
    let login = state.github.fetch_login(&access_token).await?;

    if !validate::github_username(&login) {
        warn!("Invalid GitHub login in profile response");
        return Err(ApiError::Validation("GitHub username"));
    }

    let db = state.clone();
    let id = discord_id.clone();
    let account_login = login.clone();
    blocking(move || db.db.upsert_linked_account(&id, &account_login)).await?;

    info!(
        "Successfully linked user: discord_id={}, github_login={}",
        mask::hash_preview(&discord_id),
        login
    );
    Ok(login)
}

// ── Handlers ────────────────────────────────────────────────────────────

pub async fn oauth_start(
    State(state): State<AppState>,
    Query(query): Query<StartQuery>,
) -> Result<Redirect, ApiError> {
    let discord_id = query
        .discord_id
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(ApiError::Validation("Discord ID"))?;

    let url = start_flow(&state, discord_id).await?;
    Ok(Redirect::temporary(&url))
}

pub async fn oauth_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<&'static str, ApiError> {
    let code = query.code.as_deref().filter(|s| !s.is_empty());
    let token = query.state.as_deref().filter(|s| !s.is_empty());
    let (Some(code), Some(token)) = (code, token) else {
        warn!("Missing code or state in OAuth callback");
        return Err(ApiError::MissingParams);
    };

    complete_flow(&state, code, token).await?;
    Ok("GitHub account linked successfully! You can return to Discord and use /log command.")
}
