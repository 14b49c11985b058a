//! Background expiry watchdog.
//!
//! Periodically scans for non-terminal licenses whose `expires_at` has
//! passed and transitions them to `expired` through the pool, under the
//! same per-company lock discipline as every other command.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::db::queries;
use crate::pool::LicensePool;

/// Start the expiry watchdog loop. Returns a token that stops it.
pub fn start(pool: Arc<LicensePool>, interval_secs: u64) -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let interval = Duration::from_secs(interval_secs);

    tokio::spawn(async move {
        tracing::info!("expiry watchdog started (interval={interval:?})");
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!("expiry watchdog stopped");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    match pool.expire_due(queries::now()).await {
                        Ok(0) => {}
                        Ok(n) => tracing::info!("expiry watchdog: expired {n} licenses"),
                        Err(e) => tracing::warn!("expiry watchdog error: {e}"),
                    }
                }
            }
        }
    });

    cancel
}
