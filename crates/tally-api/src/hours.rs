use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use serde::Deserialize;
use tracing::{info, warn};

use tally_types::api::{HistoryResponse, HourEntry, LogHoursRequest, LogHoursResponse};

use crate::error::ApiError;
use crate::{AppState, blocking, check_command_access, mask, parse_db_timestamp, validate};

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    5
}

/// POST /users/{discord_id}/hours — record a volunteer-hours entry against
/// a commit. Requires a linked account.
pub async fn log_hours(
    State(state): State<AppState>,
    Path(discord_id): Path<String>,
    Json(req): Json<LogHoursRequest>,
) -> Result<impl IntoResponse, ApiError> {
    check_command_access(&state, &discord_id)?;

    if !validate::hours(req.hours) {
        return Err(ApiError::Validation("hours"));
    }
    if !validate::commit_id(&req.commit_id) {
        return Err(ApiError::Validation("commit ID"));
    }

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

    let db = state.clone();
    let id = discord_id.clone();
    let sha = req.commit_id.clone();
    let hours = req.hours;
    blocking(move || db.db.insert_hour_log(&id, &sha, hours)).await?;

    info!(
        "User {} logged {}h for commit {}",
        mask::hash_preview(&discord_id),
        req.hours,
        &req.commit_id[..7]
    );

    Ok((
        StatusCode::CREATED,
        Json(LogHoursResponse {
            commit_id: req.commit_id,
            hours: req.hours,
        }),
    ))
}

/// GET /users/{discord_id}/hours?limit=N — recent entries, newest first,
/// with a running total. Stored rows are re-validated on the way out.
pub async fn history(
    State(state): State<AppState>,
    Path(discord_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    check_command_access(&state, &discord_id)?;

    if !validate::history_limit(query.limit) {
        return Err(ApiError::Validation("limit"));
    }

    let db = state.clone();
    let id = discord_id.clone();
    let limit = query.limit;
    let rows = blocking(move || db.db.get_recent_hour_logs(&id, limit)).await?;

    let mut entries = Vec::with_capacity(rows.len());
    let mut total_hours = 0.0;
    for row in rows {
        if !validate::commit_id(&row.commit_id) {
            warn!(
                "Invalid commit SHA in history: {}",
                mask::hash_preview(&row.commit_id)
            );
            continue;
        }
        if !validate::hours(row.hours) {
            warn!("Invalid hours in history: {}", row.hours);
            continue;
        }
        total_hours += row.hours;
        entries.push(HourEntry {
            commit_id: row.commit_id,
            hours: row.hours,
            logged_at: parse_db_timestamp(&row.logged_at),
        });
    }

    info!(
        "User {} viewed {} logs",
        mask::hash_preview(&discord_id),
        entries.len()
    );
    Ok(Json(HistoryResponse { entries, total_hours }))
}

/// GET /users/{discord_id}/hours/export — all entries as CSV.
pub async fn export_csv(
    State(state): State<AppState>,
    Path(discord_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    check_command_access(&state, &discord_id)?;

    let db = state.clone();
    let id = discord_id.clone();
    let rows = blocking(move || db.db.get_all_hour_logs(&id)).await?;

    let mut csv = String::from("commit_id,hours,logged_at\n");
    for row in &rows {
        if !validate::commit_id(&row.commit_id) || !validate::hours(row.hours) {
            warn!("Skipping invalid hour log row {}", row.id);
            continue;
        }
        csv.push_str(&format!("{},{},{}\n", row.commit_id, row.hours, row.logged_at));
    }

    info!(
        "User {} exported {} log rows",
        mask::hash_preview(&discord_id),
        rows.len()
    );
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"volunteer-hours.csv\"",
            ),
        ],
        csv,
    ))
}
