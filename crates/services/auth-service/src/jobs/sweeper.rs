//! Periodic purge of expired dormant accounts.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use common::AppResult;

use crate::service::{PurgeReport, UserLifecycle};

/// Triggers [`UserLifecycle::purge_expired`] on a schedule. Holds no state
/// between runs.
pub struct DormancySweeper {
    lifecycle: Arc<dyn UserLifecycle>,
    interval: Duration,
}

impl DormancySweeper {
    pub fn new(lifecycle: Arc<dyn UserLifecycle>, interval: Duration) -> Self {
        Self {
            lifecycle,
            interval,
        }
    }

    /// Run one sweep and log its summary.
    pub async fn run_once(&self) -> AppResult<PurgeReport> {
        let report = self.lifecycle.purge_expired().await?;

        if report.is_clean() {
            info!(
                scanned = report.scanned,
                purged = report.purged.len(),
                "Dormancy sweep finished"
            );
        } else {
            warn!(
                scanned = report.scanned,
                purged = report.purged.len(),
                failed = report.failures.len(),
                "Dormancy sweep finished with failures"
            );
        }

        Ok(report)
    }

    /// Sweep every interval until `shutdown` turns `true`. The first sweep
    /// runs immediately.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = self.interval.as_secs(), "Dormancy sweeper started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        error!(error = %e, "Dormancy sweep failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Dormancy sweeper stopped");
    }

    /// Spawn [`run`](Self::run) onto the runtime.
    pub fn start(self, shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
