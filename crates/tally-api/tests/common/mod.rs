use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use http_body_util::BodyExt;
use httpmock::MockServer;

use tally_api::github::{GithubClient, GithubConfig};
use tally_api::rate_limit::RateLimiter;
use tally_api::{AppState, AppStateInner};
use tally_db::Database;

static DB_COUNTER: AtomicU32 = AtomicU32::new(0);

/// File-backed test database (WAL needs a real file); cleaned up on drop.
pub struct TempDb {
    pub path: PathBuf,
}

impl TempDb {
    pub fn new(name: &str) -> Self {
        let path = std::env::temp_dir().join(format!(
            "tally-it-{}-{}-{}.db",
            name,
            std::process::id(),
            DB_COUNTER.fetch_add(1, Ordering::Relaxed),
        ));
        let _ = std::fs::remove_file(&path);
        Self { path }
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", self.path.display(), suffix));
        }
    }
}

/// App state wired to a mock GitHub, with production limiter settings.
pub fn test_state(server: &MockServer, db_path: &Path) -> AppState {
    test_state_with_limiters(
        server,
        db_path,
        RateLimiter::new(5, Duration::from_secs(300)),
        RateLimiter::new(100, Duration::from_secs(60)),
    )
}

pub fn test_state_with_limiters(
    server: &MockServer,
    db_path: &Path,
    oauth_limiter: RateLimiter,
    command_limiter: RateLimiter,
) -> AppState {
    let db = Database::open(db_path).expect("open test db");
    let github = GithubClient::new(GithubConfig {
        client_id: "test-client-id".to_string(),
        client_secret: "test-client-secret".to_string(),
        service_token: "test-service-token".to_string(),
        oauth_base: server.base_url(),
        api_base: server.base_url(),
    })
    .expect("build github client");

    Arc::new(AppStateInner {
        db,
        github,
        oauth_limiter,
        command_limiter,
        public_base_url: "http://localhost:8000".to_string(),
        state_ttl_secs: 600,
    })
}

pub async fn body_text(response: axum::response::Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect response body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("response body should be utf-8")
}
