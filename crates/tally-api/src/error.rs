use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Error taxonomy for the linking flow and the command-surface API.
///
/// `Display` text is operator-facing and goes to the log. The HTTP body is
/// always one generic sentence — upstream status bodies and internal error
/// text never reach the end user.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing code or state parameter")]
    MissingParams,

    #[error("invalid {0}")]
    Validation(&'static str),

    #[error("state token unknown, expired, or already consumed")]
    InvalidState,

    #[error("rate limit exceeded, retry after {retry_after:.0}s")]
    RateLimited { retry_after: f64 },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("token exchange with GitHub failed")]
    UpstreamAuth,

    #[error("GitHub profile fetch failed")]
    UpstreamProfile,

    #[error("GitHub request failed")]
    Upstream,

    #[error("GitHub request timed out")]
    UpstreamTimeout,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::UpstreamTimeout
        } else {
            ApiError::Upstream
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::MissingParams => {
                (StatusCode::BAD_REQUEST, "Missing required parameters".to_string())
            }
            ApiError::Validation(field) => (StatusCode::BAD_REQUEST, format!("Invalid {field}")),
            ApiError::InvalidState => {
                (StatusCode::BAD_REQUEST, "Invalid or expired state".to_string())
            }
            ApiError::RateLimited { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                format!("Rate limit exceeded. Please try again in {retry_after:.0} seconds."),
            ),
            ApiError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{what} not found")),
            ApiError::UpstreamAuth => (
                StatusCode::BAD_GATEWAY,
                "Failed to authenticate with GitHub".to_string(),
            ),
            ApiError::UpstreamProfile => (
                StatusCode::BAD_GATEWAY,
                "Failed to get user information".to_string(),
            ),
            ApiError::Upstream => (StatusCode::BAD_GATEWAY, "GitHub API error".to_string()),
            ApiError::UpstreamTimeout => {
                (StatusCode::GATEWAY_TIMEOUT, "GitHub API timeout".to_string())
            }
            ApiError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        if let ApiError::RateLimited { retry_after } = &self {
            let secs = format!("{:.0}", retry_after.ceil().max(0.0));
            return (status, [(header::RETRY_AFTER, secs)], message).into_response();
        }

        (status, message).into_response()
    }
}
