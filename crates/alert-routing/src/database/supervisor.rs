//! Supervisor queue: alerts that need a human decision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::DatabaseManager;
use crate::error::Result;

/// An alert waiting for supervisor triage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupervisorQueueEntry {
    pub alert_id: String,
    pub reason: String,
    /// `rule` or `sweeper`
    pub source: String,
    pub rule_id: Option<String>,
    pub queued_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl SupervisorQueueEntry {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(SupervisorQueueEntry {
            alert_id: row.try_get("alert_id")?,
            reason: row.try_get("reason")?,
            source: row.try_get("source")?,
            rule_id: row.try_get("rule_id")?,
            queued_at: row.try_get("queued_at")?,
            resolved_at: row.try_get("resolved_at")?,
        })
    }
}

impl DatabaseManager {
    /// Queue an alert for supervisors. Returns false if it was already queued.
    pub async fn enqueue_for_supervisor(
        &self,
        alert_id: &str,
        reason: &str,
        source: &str,
        rule_id: Option<&str>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO supervisor_queue (alert_id, reason, source, rule_id, queued_at, resolved_at)
             VALUES (?, ?, ?, ?, ?, NULL)
             ON CONFLICT(alert_id) DO UPDATE SET
                reason = excluded.reason,
                source = excluded.source,
                rule_id = excluded.rule_id,
                queued_at = excluded.queued_at,
                resolved_at = NULL
             WHERE supervisor_queue.resolved_at IS NOT NULL",
        )
        .bind(alert_id)
        .bind(reason)
        .bind(source)
        .bind(rule_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Open entries, oldest first
    pub async fn list_supervisor_queue(&self) -> Result<Vec<SupervisorQueueEntry>> {
        let rows = sqlx::query(
            "SELECT alert_id, reason, source, rule_id, queued_at, resolved_at
               FROM supervisor_queue
              WHERE resolved_at IS NULL
              ORDER BY queued_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(SupervisorQueueEntry::from_row).collect()
    }

    /// Entries queued in `[start, end)`, resolved or not
    pub async fn count_escalations(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<u64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM supervisor_queue WHERE queued_at >= ? AND queued_at < ?",
        )
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        Ok(u64::try_from(total).unwrap_or(0))
    }
}
