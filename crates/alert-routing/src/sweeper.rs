//! Stale alert sweeper.
//!
//! Finds PENDING assignments older than a threshold and escalates each one
//! with a status-guarded reassignment. Re-running a sweep is a no-op for
//! records that already moved on.

use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{Result, RoutingError};
use crate::orchestrator::RoutingEngine;
use crate::routing::StaleOutcome;

/// What one sweep did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Stale PENDING records found
    pub scanned: usize,
    /// Reassigned to an escalation target
    pub escalated: usize,
    /// Moved by someone else between scan and transition
    pub conflicts: usize,
    /// No target; left PENDING and queued for supervisors
    pub unroutable: usize,
    /// Hit a storage error; left for the next sweep
    pub failed: usize,
}

impl RoutingEngine {
    /// Escalate every PENDING assignment older than `max_age_days`
    pub async fn handle_stale_alerts(&self, max_age_days: u32) -> Result<SweepReport> {
        if max_age_days == 0 {
            return Err(RoutingError::invalid_input("max_age_days must be greater than 0"));
        }

        let cutoff = Utc::now() - chrono::Duration::days(i64::from(max_age_days));
        let stale = self.db.find_stale_assignments(cutoff).await?;
        let mut report = SweepReport { scanned: stale.len(), ..Default::default() };

        for assignment in &stale {
            match self.executor.escalate_stale(assignment).await {
                Ok(StaleOutcome::Reassigned(created)) => {
                    info!(
                        alert_id = %assignment.alert_id,
                        from = %assignment.assigned_agent_id,
                        to = %created.assigned_agent_id,
                        "Stale alert escalated"
                    );
                    report.escalated += 1;
                }
                Ok(StaleOutcome::Conflict) => {
                    debug!(alert_id = %assignment.alert_id, "Stale alert already moved on");
                    report.conflicts += 1;
                }
                Ok(StaleOutcome::Queued { .. }) => {
                    warn!(alert_id = %assignment.alert_id, "No escalation target for stale alert");
                    report.unroutable += 1;
                }
                Err(e) => {
                    error!(alert_id = %assignment.alert_id, "Failed to escalate stale alert: {}", e);
                    report.failed += 1;
                }
            }
        }

        if report.scanned > 0 {
            info!(
                scanned = report.scanned,
                escalated = report.escalated,
                conflicts = report.conflicts,
                unroutable = report.unroutable,
                failed = report.failed,
                "Stale alert sweep finished"
            );
        }
        Ok(report)
    }
}

impl RoutingEngine {
    /// Start the background tasks enabled in config.
    ///
    /// Returns `None` when `[sweeper] enabled` is off.
    pub fn start_background_tasks(&self) -> Option<SweeperHandle> {
        if !self.config().sweeper.enabled {
            info!("Stale alert sweeper disabled in config");
            return None;
        }
        Some(StaleAlertSweeper::new(self.clone()).spawn())
    }
}

/// Periodic driver for [`RoutingEngine::handle_stale_alerts`]
pub struct StaleAlertSweeper {
    engine: RoutingEngine,
    interval: Duration,
    max_age_days: u32,
}

impl StaleAlertSweeper {
    /// Interval and threshold from the engine's `[sweeper]` config
    pub fn new(engine: RoutingEngine) -> Self {
        let interval = engine.config().sweeper.interval();
        let max_age_days = engine.config().sweeper.max_age_days;
        Self { engine, interval, max_age_days }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_age_days(mut self, days: u32) -> Self {
        self.max_age_days = days;
        self
    }

    /// Run until the returned handle is shut down
    pub fn spawn(self) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            info!(
                interval_secs = self.interval.as_secs(),
                max_age_days = self.max_age_days,
                "Stale alert sweeper started"
            );

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = self.engine.handle_stale_alerts(self.max_age_days).await {
                            error!("Stale alert sweep failed: {}", e);
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Stale alert sweeper stopped");
        });

        SweeperHandle { shutdown_tx, task }
    }
}

/// Handle to a running sweeper task
pub struct SweeperHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait for the current sweep to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            warn!("Sweeper task ended abnormally: {}", e);
        }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}
