//! Housekeeping task
//!
//! Periodically prompts the engine to sweep stale acknowledgements, incoming
//! alerts, and cold proximity state. Runs on its own cadence, independent of
//! the broadcast interval, and exits as soon as the engine goes away.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::engine::InternalEvent;

/// Periodic staleness sweep trigger
pub struct HousekeepingTask {
    period: Duration,
    internal_tx: mpsc::UnboundedSender<InternalEvent>,
}

impl HousekeepingTask {
    pub fn new(period: Duration, internal_tx: mpsc::UnboundedSender<InternalEvent>) -> Self {
        Self {
            period,
            internal_tx,
        }
    }

    pub async fn run(self) {
        info!(period_secs = self.period.as_secs(), "housekeeping task starting");

        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so the first sweep
        // happens one full period after startup
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.internal_tx.send(InternalEvent::SweepDue).is_err() {
                        break;
                    }
                    debug!("housekeeping sweep requested");
                }
                _ = self.internal_tx.closed() => {
                    break;
                }
            }
        }

        info!("housekeeping task stopped");
    }
}
