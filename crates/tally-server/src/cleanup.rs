use std::time::Duration;

use tracing::{info, warn};

use tally_api::AppState;

/// Background task that prunes abandoned OAuth states past their TTL and
/// evicts idle rate-limiter entries.
///
/// Expiry is also enforced on read, so this loop only bounds storage and
/// memory growth; correctness does not depend on it running.
pub async fn run_sweep_loop(state: AppState, ttl_secs: u64, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        let db = state.clone();
        match tokio::task::spawn_blocking(move || db.db.purge_expired_oauth_states(ttl_secs)).await
        {
            Ok(Ok(count)) => {
                if count > 0 {
                    info!("Sweep: purged {} expired OAuth states", count);
                }
            }
            Ok(Err(e)) => warn!("Sweep error: {e:#}"),
            Err(e) => warn!("Sweep join error: {e}"),
        }

        let evicted = state.oauth_limiter.evict_idle() + state.command_limiter.evict_idle();
        if evicted > 0 {
            info!("Sweep: evicted {} idle rate-limiter entries", evicted);
        }
    }
}
