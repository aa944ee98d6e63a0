use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{error, info};

use tally_types::api::CommitInfo;

use crate::error::ApiError;
use crate::mask;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("tally/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct GithubConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Server-side token used for the public events feed.
    pub service_token: String,
    /// `https://github.com` in production; overridable for tests.
    pub oauth_base: String,
    /// `https://api.github.com` in production; overridable for tests.
    pub api_base: String,
}

impl GithubConfig {
    pub fn new(client_id: String, client_secret: String, service_token: String) -> Self {
        Self {
            client_id,
            client_secret,
            service_token,
            oauth_base: "https://github.com".to_string(),
            api_base: "https://api.github.com".to_string(),
        }
    }
}

/// HTTP client for the GitHub OAuth endpoints and REST API. Every request
/// carries the 30-second timeout baked into the inner client.
pub struct GithubClient {
    http: reqwest::Client,
    config: GithubConfig,
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GithubUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct GithubEvent {
    #[serde(rename = "type")]
    kind: String,
    repo: Option<GithubEventRepo>,
    #[serde(default)]
    payload: GithubEventPayload,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct GithubEventRepo {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct GithubEventPayload {
    #[serde(default)]
    commits: Vec<GithubEventCommit>,
}

#[derive(Debug, Deserialize)]
struct GithubEventCommit {
    sha: String,
    message: String,
}

impl GithubClient {
    pub fn new(config: GithubConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http, config })
    }

    /// Authorization URL for the browser redirect: client id, callback,
    /// state token, and read-only profile scope.
    pub fn authorize_url(&self, redirect_uri: &str, state: &str) -> anyhow::Result<String> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/login/oauth/authorize", self.config.oauth_base),
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("state", state),
                ("scope", "read:user"),
            ],
        )
        .context("failed to build authorize URL")?;
        Ok(url.into())
    }

    /// Exchange an authorization code for an access token.
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<String, ApiError> {
        let response = self
            .http
            .post(format!("{}/login/oauth/access_token", self.config.oauth_base))
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await
            .map_err(|e| {
                error!("Token exchange request failed: {e}");
                ApiError::from_reqwest(&e)
            })?;

        let status = response.status();
        info!("Token response status: {status}");
        if !status.is_success() {
            error!("GitHub token exchange failed: {status}");
            return Err(ApiError::UpstreamAuth);
        }

        let body: AccessTokenResponse = response.json().await.map_err(|e| {
            error!("Token exchange response unreadable: {e}");
            ApiError::UpstreamAuth
        })?;

        match body.access_token {
            Some(token) => {
                info!("Got access token: {}", mask::mask_token(&token));
                Ok(token)
            }
            None => {
                let detail = body.error_description.unwrap_or_else(|| "unknown error".into());
                error!("No access token in response: {detail}");
                Err(ApiError::UpstreamAuth)
            }
        }
    }

    /// Fetch the authenticated user's login with a fresh access token.
    pub async fn fetch_login(&self, access_token: &str) -> Result<String, ApiError> {
        let response = self
            .http
            .get(format!("{}/user", self.config.api_base))
            .header(reqwest::header::AUTHORIZATION, format!("token {access_token}"))
            .send()
            .await
            .map_err(|e| {
                error!("Profile request failed: {e}");
                ApiError::from_reqwest(&e)
            })?;

        let status = response.status();
        info!("User response status: {status}");
        if !status.is_success() {
            error!("GitHub user API failed: {status}");
            return Err(ApiError::UpstreamProfile);
        }

        let user: GithubUser = response.json().await.map_err(|e| {
            error!("Profile response unreadable: {e}");
            ApiError::UpstreamProfile
        })?;

        Ok(user.login)
    }

    /// Commits pushed by `login` since the given instant, flattened out of
    /// the public events feed. Commit IDs and messages come from an
    /// external source and must be re-validated by the caller.
    pub async fn recent_commits(
        &self,
        login: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<CommitInfo>, ApiError> {
        let response = self
            .http
            .get(format!("{}/users/{login}/events", self.config.api_base))
            .header(
                reqwest::header::AUTHORIZATION,
                format!("token {}", self.config.service_token),
            )
            .send()
            .await
            .map_err(|e| {
                error!("Events request failed: {e}");
                ApiError::from_reqwest(&e)
            })?;

        let status = response.status();
        if !status.is_success() {
            error!("GitHub events API failed: {status}");
            return Err(ApiError::Upstream);
        }

        let events: Vec<GithubEvent> = response.json().await.map_err(|e| {
            error!("Events response unreadable: {e}");
            ApiError::Upstream
        })?;

        let commits = events
            .into_iter()
            .filter(|e| e.kind == "PushEvent" && e.created_at >= since)
            .flat_map(|event| {
                let repo = event
                    .repo
                    .map(|r| r.name)
                    .unwrap_or_else(|| "unknown".to_string());
                let date = event.created_at;
                event.payload.commits.into_iter().map(move |c| CommitInfo {
                    id: c.sha,
                    message: c.message,
                    repo: repo.clone(),
                    date,
                })
            })
            .collect();

        Ok(commits)
    }
}
