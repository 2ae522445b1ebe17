use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::backend::{BackendError, TicketBackend};
use crate::config::StatsConfig;
use crate::ticket::VerificationStats;

/// One statistics fetch and when it happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsReport {
    pub stats: VerificationStats,
    pub fetched_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concert_id: Option<String>,
}

/// Fetches verification statistics, once or on an interval.
pub struct StatsMonitor {
    backend: Arc<dyn TicketBackend>,
    concert_id: Option<String>,
    interval: Duration,
}

impl StatsMonitor {
    pub fn new(config: &StatsConfig, backend: Arc<dyn TicketBackend>) -> Self {
        Self {
            backend,
            concert_id: config.concert_id.clone(),
            interval: Duration::from_secs(config.refresh_interval_secs),
        }
    }

    /// Override the configured concert filter.
    pub fn with_concert_id(mut self, concert_id: Option<String>) -> Self {
        self.concert_id = concert_id;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn fetch_once(&self) -> Result<StatsReport, BackendError> {
        let stats = self.backend.stats(self.concert_id.as_deref()).await?;
        Ok(StatsReport {
            stats,
            fetched_at: Utc::now(),
            concert_id: self.concert_id.clone(),
        })
    }

    /// Poll in the background, reporting every result to `callback`.
    ///
    /// The first fetch happens immediately. A failed fetch is reported and
    /// the next one waits for the regular interval.
    pub fn spawn<F>(self, callback: F) -> StatsMonitorHandle
    where
        F: Fn(Result<StatsReport, BackendError>) + Send + Sync + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);

        let task = tokio::spawn(async move {
            info!(
                concert_id = self.concert_id.as_deref().unwrap_or("all"),
                "Stats monitor started, refreshing every {:?}", self.interval
            );

            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Stats monitor received shutdown signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        let result = self.fetch_once().await;
                        match &result {
                            Ok(report) => debug!(
                                total = report.stats.total_tickets,
                                used = report.stats.used_tickets,
                                "Fetched verification stats"
                            ),
                            Err(e) => warn!("Failed to fetch verification stats: {}", e),
                        }
                        callback(result);
                    }
                }
            }
        });

        StatsMonitorHandle { shutdown_tx, task }
    }
}

/// Controls a spawned [`StatsMonitor`].
pub struct StatsMonitorHandle {
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl StatsMonitorHandle {
    /// Signal the loop to stop and wait for it to exit.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            if !e.is_cancelled() {
                warn!("Stats monitor task failed: {}", e);
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
