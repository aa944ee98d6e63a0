use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use tracing::{info, warn};

use tally_types::api::{CommitInfo, LinkStatusResponse};

use crate::error::ApiError;
use crate::{AppState, blocking, check_command_access, mask, parse_db_timestamp, validate};

const RECENT_COMMIT_DAYS: i64 = 7;
/// Cap matching the chat platform's select-menu size.
const MAX_COMMIT_OPTIONS: usize = 25;
const COMMIT_MESSAGE_MAX: usize = 50;

/// GET /users/{discord_id} — link status plus recent-commit count.
pub async fn link_status(
    State(state): State<AppState>,
    Path(discord_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    check_command_access(&state, &discord_id)?;

    let db = state.clone();
    let id = discord_id.clone();
    let account = blocking(move || db.db.get_linked_account(&id))
        .await?
        .ok_or(ApiError::NotFound("Linked account"))?;

    if !validate::github_username(&account.github_login) {
        warn!(
            "Invalid GitHub username in database: {}",
            mask::hash_preview(&account.github_login)
        );
        return Err(ApiError::Validation("GitHub username"));
    }

    let since = Utc::now() - chrono::Duration::days(RECENT_COMMIT_DAYS);
    let commits = state.github.recent_commits(&account.github_login, since).await?;

    info!("User {} checked status", mask::hash_preview(&discord_id));
    Ok(Json(LinkStatusResponse {
        discord_id: account.discord_id,
        github_login: account.github_login,
        validated_at: parse_db_timestamp(&account.validated_at),
        recent_commits: commits.len(),
    }))
}

/// DELETE /users/{discord_id} — drop the account link.
pub async fn unlink(
    State(state): State<AppState>,
    Path(discord_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    check_command_access(&state, &discord_id)?;

    let db = state.clone();
    let id = discord_id.clone();
    let removed = blocking(move || db.db.delete_linked_account(&id)).await?;
    if !removed {
        return Err(ApiError::NotFound("Linked account"));
    }

    info!("User {} unlinked", mask::hash_preview(&discord_id));
    Ok(StatusCode::NO_CONTENT)
}

/// GET /users/{discord_id}/commits — the user's commits from the trailing
/// 7 days, ready for a selection menu. Commit IDs and messages arrive from
/// the events feed and are validated/sanitized here before they go out.
pub async fn recent_commits(
    State(state): State<AppState>,
    Path(discord_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    check_command_access(&state, &discord_id)?;

    let db = state.clone();
    let id = discord_id.clone();
    let account = blocking(move || db.db.get_linked_account(&id))
        .await?
        .ok_or(ApiError::NotFound("Linked account"))?;

    if !validate::github_username(&account.github_login) {
        warn!(
            "Invalid GitHub username in database: {}",
            mask::hash_preview(&account.github_login)
        );
        return Err(ApiError::Validation("GitHub username"));
    }

    let since = Utc::now() - chrono::Duration::days(RECENT_COMMIT_DAYS);
    let commits = state.github.recent_commits(&account.github_login, since).await?;

    let options: Vec<CommitInfo> = commits
        .into_iter()
        .filter(|c| {
            if validate::commit_id(&c.id) {
                true
            } else {
                warn!("Invalid commit SHA in events feed: {}", mask::hash_preview(&c.id));
                false
            }
        })
        .map(|c| {
            let message = validate::sanitize(&c.message, COMMIT_MESSAGE_MAX)
                .replace('\n', " ")
                .trim()
                .to_string();
            CommitInfo { message, ..c }
        })
        .take(MAX_COMMIT_OPTIONS)
        .collect();

    info!(
        "User {} fetched {} recent commits",
        mask::hash_preview(&discord_id),
        options.len()
    );
    Ok(Json(options))
}
