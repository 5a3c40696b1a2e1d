//! Periodic follow-up processing

use crate::services::Services;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Background task calling `process_due_followups` on a fixed interval
pub struct FollowUpScheduler {
    services: Arc<Services>,
    interval: Duration,
    cancel_token: CancellationToken,
}

impl FollowUpScheduler {
    pub fn new(
        services: Arc<Services>,
        interval: Duration,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            services,
            interval,
            cancel_token,
        }
    }

    /// Spawn the loop; it exits once the token is cancelled
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(self) {
        info!(interval_secs = self.interval.as_secs(), "Follow-up scheduler started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick completes immediately; skip it so startup does not send
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Follow-up scheduler stopped");
                    break;
                }
                _ = ticker.tick() => {
                    match self.services.outreach.process_due_followups().await {
                        Ok(sent) => debug!(sent, "Scheduled follow-up run complete"),
                        Err(e) => warn!("Scheduled follow-up run failed: {}", e),
                    }
                }
            }
        }
    }
}
