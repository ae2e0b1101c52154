//! Periodic carrier status reconciliation.

use std::{sync::Arc, time::Duration};

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::{
    carrier::Carrier,
    services::status_sync::{self, SyncReport},
    store::OrderStore,
};

/// Runs the status sync on a fixed interval until `shutdown` fires.
///
/// Runs never overlap: a slow run delays the next tick instead of stacking.
pub struct StatusSyncJob {
    store: Arc<dyn OrderStore>,
    carrier: Arc<dyn Carrier>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl StatusSyncJob {
    pub fn new(
        store: Arc<dyn OrderStore>,
        carrier: Arc<dyn Carrier>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store,
            carrier,
            interval,
            shutdown,
        }
    }

    pub async fn run(self) {
        tracing::info!(interval_secs = self.interval.as_secs(), "status sync job started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_once().await;
                }
                _ = self.shutdown.cancelled() => {
                    tracing::info!("status sync job received shutdown signal");
                    return;
                }
            }
        }
    }

    pub async fn run_once(&self) -> Option<SyncReport> {
        match status_sync::sync_statuses(self.store.as_ref(), self.carrier.as_ref(), &self.shutdown).await {
            Ok(report) => {
                if report.failed > 0 {
                    tracing::warn!(failed = report.failed, "some orders failed to sync");
                }
                Some(report)
            }
            Err(err) => {
                tracing::error!(error = %err, "status sync run failed");
                None
            }
        }
    }
}
