mod cleanup;
mod config;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use tally_api::github::{GithubClient, GithubConfig};
use tally_api::rate_limit::RateLimiter;
use tally_api::{AppState, AppStateInner};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tally=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;
    info!(
        "GitHub client ID: {}",
        tally_api::mask::mask_token(&config.github_client_id)
    );
    info!("OAuth callback URL: {}/oauth/callback", config.public_base_url);

    let db = tally_db::Database::open(&config.db_path)?;

    let github = GithubClient::new(GithubConfig::new(
        config.github_client_id.clone(),
        config.github_client_secret.clone(),
        config.github_token.clone(),
    ))?;

    let state: AppState = Arc::new(AppStateInner {
        db,
        github,
        oauth_limiter: RateLimiter::new(5, Duration::from_secs(300)),
        command_limiter: RateLimiter::new(10, Duration::from_secs(60)),
        public_base_url: config.public_base_url.clone(),
        state_ttl_secs: config.state_ttl_secs,
    });

    tokio::spawn(cleanup::run_sweep_loop(
        state.clone(),
        config.state_ttl_secs,
        config.sweep_interval_secs,
    ));

    let app = tally_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Tally server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
