use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// -- Account linking --

#[derive(Debug, Serialize)]
pub struct LinkStatusResponse {
    pub discord_id: String,
    pub github_login: String,
    pub validated_at: DateTime<Utc>,
    /// Commits pushed in the trailing 7 days.
    pub recent_commits: usize,
}

// -- Commits --

#[derive(Debug, Clone, Serialize)]
pub struct CommitInfo {
    pub id: String,
    pub message: String,
    pub repo: String,
    pub date: DateTime<Utc>,
}

// -- Volunteer hours --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogHoursRequest {
    pub commit_id: String,
    pub hours: f64,
}

#[derive(Debug, Serialize)]
pub struct LogHoursResponse {
    pub commit_id: String,
    pub hours: f64,
}

#[derive(Debug, Serialize)]
pub struct HourEntry {
    pub commit_id: String,
    pub hours: f64,
    pub logged_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub entries: Vec<HourEntry>,
    pub total_hours: f64,
}
