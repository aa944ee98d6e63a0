/// Database row types — these map directly to SQLite rows.
/// Distinct from the tally-types API models to keep the DB layer independent.

pub struct LinkedAccountRow {
    pub discord_id: String,
    pub github_login: String,
    pub validated_at: String,
}

pub struct HourLogRow {
    pub id: i64,
    pub discord_id: String,
    pub commit_id: String,
    pub hours: f64,
    pub logged_at: String,
}
