use crate::Database;
use crate::models::{HourLogRow, LinkedAccountRow};
use anyhow::Result;
use rusqlite::Connection;

impl Database {
    // -- OAuth states --

    /// Insert a pending state token. INSERT OR REPLACE so a (vanishingly
    /// unlikely) token collision overwrites instead of erroring.
    pub fn create_oauth_state(&self, state: &str, discord_id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO oauth_states (state, discord_id) VALUES (?1, ?2)",
                (state, discord_id),
            )?;
            Ok(())
        })
    }

    /// Atomically look up and remove a state token in a single statement.
    ///
    /// Returns the bound discord_id exactly once; a second call with the
    /// same token, an unknown token, or a token older than `ttl_secs` all
    /// return `None`. An expired row is removed as a side effect, so expiry
    /// is enforced on read even if the sweep never runs.
    pub fn consume_oauth_state(&self, state: &str, ttl_secs: u64) -> Result<Option<String>> {
        let cutoff = format!("-{} seconds", ttl_secs);
        self.with_conn_mut(|conn| {
            let row = conn
                .query_row(
                    "DELETE FROM oauth_states WHERE state = ?1
                     RETURNING discord_id, created_at >= datetime('now', ?2)",
                    rusqlite::params![state, cutoff],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?)),
                )
                .optional()?;

            Ok(match row {
                Some((discord_id, fresh)) if fresh => Some(discord_id),
                _ => None,
            })
        })
    }

    /// Remove a state row; no-op if absent.
    pub fn delete_oauth_state(&self, state: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute("DELETE FROM oauth_states WHERE state = ?1", [state])?;
            Ok(())
        })
    }

    /// Drop abandoned states older than the TTL. Returns the purged count.
    pub fn purge_expired_oauth_states(&self, ttl_secs: u64) -> Result<usize> {
        let cutoff = format!("-{} seconds", ttl_secs);
        self.with_conn_mut(|conn| {
            let count = conn.execute(
                "DELETE FROM oauth_states WHERE created_at < datetime('now', ?1)",
                [&cutoff],
            )?;
            Ok(count)
        })
    }

    // -- Linked accounts --

    /// At most one github login per discord identity: insert-or-replace.
    pub fn upsert_linked_account(&self, discord_id: &str, github_login: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO users (discord_id, github_login, validated_at)
                 VALUES (?1, ?2, datetime('now'))",
                (discord_id, github_login),
            )?;
            Ok(())
        })
    }

    pub fn get_linked_account(&self, discord_id: &str) -> Result<Option<LinkedAccountRow>> {
        self.with_conn(|conn| query_linked_account(conn, discord_id))
    }

    /// Returns true when a row was actually removed.
    pub fn delete_linked_account(&self, discord_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let count = conn.execute("DELETE FROM users WHERE discord_id = ?1", [discord_id])?;
            Ok(count > 0)
        })
    }

    // -- Hour logs --

    pub fn insert_hour_log(&self, discord_id: &str, commit_id: &str, hours: f64) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO hour_logs (discord_id, commit_id, hours) VALUES (?1, ?2, ?3)",
                rusqlite::params![discord_id, commit_id, hours],
            )?;
            Ok(())
        })
    }

    pub fn get_recent_hour_logs(&self, discord_id: &str, limit: u32) -> Result<Vec<HourLogRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, discord_id, commit_id, hours, logged_at FROM hour_logs
                 WHERE discord_id = ?1
                 ORDER BY logged_at DESC, id DESC
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![discord_id, limit], map_hour_log)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_all_hour_logs(&self, discord_id: &str) -> Result<Vec<HourLogRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, discord_id, commit_id, hours, logged_at FROM hour_logs
                 WHERE discord_id = ?1
                 ORDER BY logged_at ASC, id ASC",
            )?;
            let rows = stmt
                .query_map([discord_id], map_hour_log)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Health --

    pub fn health_check(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |_| Ok(()))?;
            Ok(())
        })
    }
}

fn query_linked_account(conn: &Connection, discord_id: &str) -> Result<Option<LinkedAccountRow>> {
    let mut stmt = conn.prepare(
        "SELECT discord_id, github_login, validated_at FROM users WHERE discord_id = ?1",
    )?;

    let row = stmt
        .query_row([discord_id], |row| {
            Ok(LinkedAccountRow {
                discord_id: row.get(0)?,
                github_login: row.get(1)?,
                validated_at: row.get(2)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn map_hour_log(row: &rusqlite::Row<'_>) -> std::result::Result<HourLogRow, rusqlite::Error> {
    Ok(HourLogRow {
        id: row.get(0)?,
        discord_id: row.get(1)?,
        commit_id: row.get(2)?,
        hours: row.get(3)?,
        logged_at: row.get(4)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
