use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::{error, info, warn};

use crate::use_cases::subscription::SubscriptionUseCases;

/// Periodically re-read every unended subscription from the platform.
///
/// Catches cancellations and renewals that happened remotely while no
/// request touched the local row.
pub async fn run_resync_loop(subscription_use_cases: Arc<SubscriptionUseCases>, every_secs: u64) {
    let mut ticker = interval(Duration::from_secs(every_secs.max(1)));

    info!("Subscription re-sync started (every {}s)", every_secs);

    loop {
        ticker.tick().await;

        match subscription_use_cases.resync_all().await {
            Ok(report) if report.failed > 0 => {
                warn!(
                    refreshed = report.refreshed,
                    ended = report.ended,
                    failed = report.failed,
                    "Subscription re-sync finished with failures"
                );
            }
            Ok(report) => {
                info!(
                    refreshed = report.refreshed,
                    ended = report.ended,
                    "Subscription re-sync finished"
                );
            }
            Err(e) => {
                error!(error = ?e, "Failed to re-sync subscriptions");
            }
        }
    }
}
