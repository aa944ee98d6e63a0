use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE oauth_states (
                state       TEXT PRIMARY KEY,
                discord_id  TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_oauth_states_created
                ON oauth_states(created_at);

            CREATE TABLE users (
                discord_id    TEXT PRIMARY KEY,
                github_login  TEXT NOT NULL,
                validated_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE hour_logs (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                discord_id  TEXT NOT NULL,
                commit_id   TEXT NOT NULL,
                hours       REAL NOT NULL,
                logged_at   TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_hour_logs_user
                ON hour_logs(discord_id, logged_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    Ok(())
}
