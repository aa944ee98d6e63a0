use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use crate::AppState;

/// Liveness/readiness probe: healthy only if the database answers.
/// The unhealthy body stays generic; detail goes to the log.
pub async fn health(State(state): State<AppState>) -> Response {
    let db = state.clone();
    let result = tokio::task::spawn_blocking(move || db.db.health_check()).await;

    match result {
        Ok(Ok(())) => {
            Json(json!({ "status": "healthy", "database": "connected" })).into_response()
        }
        Ok(Err(e)) => {
            error!("Health check failed: {e:#}");
            unhealthy()
        }
        Err(e) => {
            error!("Health check join error: {e}");
            unhealthy()
        }
    }
}

fn unhealthy() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "status": "unhealthy" })),
    )
        .into_response()
}

pub async fn root() -> &'static str {
    "Tally server is running!"
}
