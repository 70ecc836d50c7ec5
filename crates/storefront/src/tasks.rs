//! Background maintenance.
//!
//! One task, spawned at startup, periodically:
//! - reconciles unpaid Midtrans orders older than a day with the gateway,
//!   so orders whose notification was lost are paid or cancelled
//! - deletes expired bearer tokens

use std::time::Duration;

use tracing::{error, info, instrument};

use crate::db::UserRepository;
use crate::services::payment::PaymentService;
use crate::state::AppState;

/// How often the sweep runs.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Unpaid orders younger than this are left to the notification flow.
pub const STALE_PAYMENT_AGE: chrono::Duration = chrono::Duration::hours(24);

/// Spawn the periodic maintenance task.
///
/// The first sweep runs immediately.
pub fn spawn_maintenance(state: AppState) {
    info!(interval_secs = SWEEP_INTERVAL.as_secs(), "Spawning maintenance task");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            sweep(&state).await;
        }
    });
}

/// One maintenance pass. Failures are logged; the next pass retries.
#[instrument(skip_all)]
pub async fn sweep(state: &AppState) {
    if let Err(e) = PaymentService::new(state).expire_stale(STALE_PAYMENT_AGE).await {
        error!(error = %e, "Stale payment sweep failed");
    }

    match UserRepository::new(state.pool()).purge_expired_tokens().await {
        Ok(0) => {}
        Ok(purged) => info!(purged, "Purged expired tokens"),
        Err(e) => error!(error = %e, "Token purge failed"),
    }
}
