use std::path::PathBuf;

use anyhow::{Context, Result};

pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub github_client_id: String,
    pub github_client_secret: String,
    pub github_token: String,
    pub public_base_url: String,
    pub state_ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Config {
    /// Read configuration from the environment. Missing or unparsable
    /// required values are fatal: the process refuses to start rather than
    /// run with undefined behavior.
    pub fn from_env() -> Result<Self> {
        let github_client_id = require("TALLY_GITHUB_CLIENT_ID")?;
        let github_client_secret = require("TALLY_GITHUB_CLIENT_SECRET")?;
        let github_token = require("TALLY_GITHUB_TOKEN")?;

        let mut public_base_url = require("TALLY_PUBLIC_BASE_URL")?;
        // Accept a value that already includes the callback path.
        if let Some(stripped) = public_base_url.strip_suffix("/oauth/callback") {
            public_base_url = stripped.to_string();
        }
        while public_base_url.ends_with('/') {
            public_base_url.pop();
        }

        let host = std::env::var("TALLY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = std::env::var("TALLY_PORT")
            .unwrap_or_else(|_| "8000".into())
            .parse()
            .context("TALLY_PORT is not a valid port number")?;
        let db_path: PathBuf = std::env::var("TALLY_DB_PATH")
            .unwrap_or_else(|_| "tally.db".into())
            .into();
        let state_ttl_secs: u64 = std::env::var("TALLY_STATE_TTL_SECS")
            .unwrap_or_else(|_| "600".into())
            .parse()
            .context("TALLY_STATE_TTL_SECS is not a valid number of seconds")?;
        let sweep_interval_secs: u64 = std::env::var("TALLY_SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|_| "300".into())
            .parse()
            .context("TALLY_SWEEP_INTERVAL_SECS is not a valid number of seconds")?;

        Ok(Self {
            host,
            port,
            db_path,
            github_client_id,
            github_client_secret,
            github_token,
            public_base_url,
            state_ttl_secs,
            sweep_interval_secs,
        })
    }
}

fn require(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .with_context(|| format!("{name} environment variable is not set"))
}
