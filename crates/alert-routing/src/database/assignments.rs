//! Alert assignment persistence.
//!
//! `reserve_slot` and `reassign_atomic` are the only ways an assignment row is
//! created. Both run the capacity check and the insert as one
//! `INSERT ... SELECT ... WHERE <active count> < max` statement inside a
//! write transaction that holds the SQLite write lock, so two concurrent
//! reservations for the last slot cannot both succeed. Every early return
//! drops the transaction, which rolls it back.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use tracing::{debug, info};
use uuid::Uuid;

use super::{to_u32, DatabaseManager};
use crate::assignment::{AlertAssignment, AssignmentStatus, NewAssignment, RoutingStrategy};
use crate::error::{Result, RoutingError};

const ASSIGNMENT_COLUMNS: &str = "assignment_id, alert_id, agent_id, assignment_reason, routing_strategy,
     rule_id, status, created_at, acknowledged_at, closed_at";

/// Which record a status-guarded transition is allowed to move
#[derive(Debug, Clone, Copy)]
pub struct StatusGuard<'a> {
    pub alert_id: &'a str,
    /// Pin the transition to one specific record
    pub assignment_id: Option<&'a str>,
    /// Statuses the open record may be in
    pub expected: &'a [AssignmentStatus],
}

impl<'a> StatusGuard<'a> {
    pub fn new(alert_id: &'a str, expected: &'a [AssignmentStatus]) -> Self {
        Self { alert_id, assignment_id: None, expected }
    }

    pub fn pinned(mut self, assignment_id: &'a str) -> Self {
        self.assignment_id = Some(assignment_id);
        self
    }

    fn expected_label(&self) -> String {
        self.expected.iter().map(|s| s.as_str()).collect::<Vec<_>>().join("|")
    }
}

/// Grouped assignment counts for a time window
#[derive(Debug, Clone, Default)]
pub struct AssignmentCounts {
    /// (stored routing strategy, status, count)
    pub rows: Vec<(String, AssignmentStatus, u64)>,
}

fn assignment_from_row(row: &SqliteRow) -> Result<AlertAssignment> {
    let status: String = row.try_get("status")?;
    let strategy: String = row.try_get("routing_strategy")?;

    Ok(AlertAssignment {
        id: row.try_get("assignment_id")?,
        alert_id: row.try_get("alert_id")?,
        assigned_agent_id: row.try_get("agent_id")?,
        assignment_reason: row.try_get("assignment_reason")?,
        routing_strategy: RoutingStrategy::from_stored(&strategy),
        rule_id: row.try_get("rule_id")?,
        status: status.parse().map_err(RoutingError::internal)?,
        created_at: row.try_get("created_at")?,
        acknowledged_at: row.try_get("acknowledged_at")?,
        closed_at: row.try_get("closed_at")?,
    })
}

/// Capacity-checked insert on a connection that already holds the write lock
async fn insert_if_capacity(
    conn: &mut SqliteConnection,
    new: &NewAssignment,
    now: DateTime<Utc>,
) -> Result<String> {
    let assignment_id = Uuid::new_v4().to_string();

    let inserted = sqlx::query(
        "INSERT INTO alert_assignments
            (assignment_id, alert_id, agent_id, assignment_reason, routing_strategy, rule_id, status, created_at)
         SELECT ?, ?, a.agent_id, ?, ?, ?, 'PENDING', ?
           FROM agents a
          WHERE a.agent_id = ?
            AND a.available = 1
            AND (SELECT COUNT(*) FROM alert_assignments s
                  WHERE s.agent_id = a.agent_id
                    AND s.status IN ('PENDING', 'ACKNOWLEDGED')) < a.max_concurrent_alerts",
    )
    .bind(&assignment_id)
    .bind(&new.alert_id)
    .bind(&new.reason)
    .bind(new.strategy.as_stored())
    .bind(&new.rule_id)
    .bind(now)
    .bind(&new.agent_id)
    .execute(&mut *conn)
    .await;

    let rows = match inserted {
        Ok(result) => result.rows_affected(),
        Err(e) if RoutingError::is_unique_violation(&e) => {
            return Err(RoutingError::AlreadyAssigned { alert_id: new.alert_id.clone() });
        }
        Err(e) => return Err(e.into()),
    };

    if rows == 0 {
        return Err(explain_rejection(conn, &new.agent_id).await?);
    }

    // An assignment takes the alert out of the supervisor queue
    sqlx::query(
        "UPDATE supervisor_queue SET resolved_at = ? WHERE alert_id = ? AND resolved_at IS NULL",
    )
    .bind(now)
    .bind(&new.alert_id)
    .execute(&mut *conn)
    .await?;

    Ok(assignment_id)
}

/// Why the conditional insert matched no agent row
async fn explain_rejection(conn: &mut SqliteConnection, agent_id: &str) -> Result<RoutingError> {
    let row = sqlx::query(
        "SELECT a.available, a.max_concurrent_alerts,
                (SELECT COUNT(*) FROM alert_assignments s
                  WHERE s.agent_id = a.agent_id AND s.status IN ('PENDING', 'ACKNOWLEDGED')) AS active_alerts
           FROM agents a WHERE a.agent_id = ?",
    )
    .bind(agent_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(RoutingError::not_found(format!("agent {}", agent_id)));
    };

    let available: bool = row.try_get("available")?;
    if !available {
        return Ok(RoutingError::AgentUnavailable { agent_id: agent_id.to_string() });
    }

    let active: i64 = row.try_get("active_alerts")?;
    let max: i64 = row.try_get("max_concurrent_alerts")?;
    debug!(agent_id, active = to_u32(active), max = to_u32(max), "Reservation rejected");
    Ok(RoutingError::capacity_exceeded(agent_id))
}

async fn fetch_by_id(conn: &mut SqliteConnection, assignment_id: &str) -> Result<AlertAssignment> {
    let sql = format!("SELECT {} FROM alert_assignments WHERE assignment_id = ?", ASSIGNMENT_COLUMNS);
    let row = sqlx::query(&sql).bind(assignment_id).fetch_one(&mut *conn).await?;
    assignment_from_row(&row)
}

async fn fetch_open(conn: &mut SqliteConnection, alert_id: &str) -> Result<Option<AlertAssignment>> {
    let sql = format!(
        "SELECT {} FROM alert_assignments
          WHERE alert_id = ? AND status IN ('PENDING', 'ACKNOWLEDGED')",
        ASSIGNMENT_COLUMNS
    );
    let row = sqlx::query(&sql).bind(alert_id).fetch_optional(&mut *conn).await?;
    row.as_ref().map(assignment_from_row).transpose()
}

/// Locate the record a guard refers to, or explain why it cannot move
async fn guarded_open(conn: &mut SqliteConnection, guard: &StatusGuard<'_>) -> Result<AlertAssignment> {
    let current = fetch_open(conn, guard.alert_id)
        .await?
        .ok_or_else(|| RoutingError::stale_state(guard.alert_id, guard.expected_label()))?;

    let pinned_elsewhere = guard.assignment_id.is_some_and(|id| id != current.id);
    if pinned_elsewhere || !guard.expected.contains(&current.status) {
        return Err(RoutingError::stale_state(guard.alert_id, guard.expected_label()));
    }
    Ok(current)
}

/// `UPDATE ... WHERE status = <observed>`; zero rows means someone else moved it
async fn close_as(
    conn: &mut SqliteConnection,
    current: &AlertAssignment,
    to: AssignmentStatus,
    now: DateTime<Utc>,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE alert_assignments SET status = ?, closed_at = ?
          WHERE assignment_id = ? AND status = ?",
    )
    .bind(to.as_str())
    .bind(now)
    .bind(&current.id)
    .bind(current.status.as_str())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RoutingError::stale_state(&current.alert_id, current.status.as_str()));
    }
    Ok(())
}

impl DatabaseManager {
    /// Atomically check capacity and create a PENDING assignment
    ///
    /// Fails with `CapacityExceeded`, `AgentUnavailable`, `NotFound` (unknown
    /// agent) or `AlreadyAssigned` (the alert already has an open record).
    pub async fn reserve_slot(&self, new: &NewAssignment) -> Result<AlertAssignment> {
        let mut tx = self.begin_write().await?;
        let id = insert_if_capacity(&mut tx, new, Utc::now()).await?;
        let assignment = fetch_by_id(&mut tx, &id).await?;
        tx.commit().await?;

        info!(
            alert_id = %assignment.alert_id,
            agent_id = %assignment.assigned_agent_id,
            strategy = %assignment.routing_strategy,
            "Assignment created"
        );
        Ok(assignment)
    }

    /// Move the guarded open record to REASSIGNED and create its successor,
    /// both or neither. Returns `(old, new)`.
    pub async fn reassign_atomic(
        &self,
        guard: StatusGuard<'_>,
        new: &NewAssignment,
    ) -> Result<(AlertAssignment, AlertAssignment)> {
        let mut tx = self.begin_write().await?;
        let current = guarded_open(&mut tx, &guard).await?;
        if current.assigned_agent_id == new.agent_id {
            return Err(RoutingError::invalid_input(format!(
                "Alert {} is already assigned to {}",
                guard.alert_id, new.agent_id
            )));
        }

        let now = Utc::now();
        close_as(&mut tx, &current, AssignmentStatus::Reassigned, now).await?;
        let new_id = insert_if_capacity(&mut tx, new, now).await?;

        let old = fetch_by_id(&mut tx, &current.id).await?;
        let created = fetch_by_id(&mut tx, &new_id).await?;
        tx.commit().await?;

        info!(
            alert_id = %created.alert_id,
            from = %old.assigned_agent_id,
            to = %created.assigned_agent_id,
            strategy = %created.routing_strategy,
            "Assignment reassigned"
        );
        Ok((old, created))
    }

    /// PENDING -> ACKNOWLEDGED, only by the assigned agent
    pub async fn acknowledge_assignment(&self, alert_id: &str, agent_id: &str) -> Result<AlertAssignment> {
        let mut tx = self.begin_write().await?;
        let guard = StatusGuard::new(alert_id, &[AssignmentStatus::Pending]);
        let current = guarded_open(&mut tx, &guard).await?;
        if current.assigned_agent_id != agent_id {
            return Err(RoutingError::invalid_input(format!(
                "Alert {} is assigned to {}, not {}",
                alert_id, current.assigned_agent_id, agent_id
            )));
        }

        let updated = sqlx::query(
            "UPDATE alert_assignments SET status = 'ACKNOWLEDGED', acknowledged_at = ?
              WHERE assignment_id = ? AND status = 'PENDING'",
        )
        .bind(Utc::now())
        .bind(&current.id)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(RoutingError::stale_state(alert_id, AssignmentStatus::Pending.as_str()));
        }

        let acknowledged = fetch_by_id(&mut tx, &current.id).await?;
        tx.commit().await?;
        Ok(acknowledged)
    }

    /// PENDING/ACKNOWLEDGED -> COMPLETED
    pub async fn complete_assignment(&self, alert_id: &str) -> Result<AlertAssignment> {
        let mut tx = self.begin_write().await?;
        let guard = StatusGuard::new(
            alert_id,
            &[AssignmentStatus::Pending, AssignmentStatus::Acknowledged],
        );
        let current = guarded_open(&mut tx, &guard).await?;
        close_as(&mut tx, &current, AssignmentStatus::Completed, Utc::now()).await?;

        let completed = fetch_by_id(&mut tx, &current.id).await?;
        tx.commit().await?;
        Ok(completed)
    }

    /// The alert's non-terminal assignment, if any
    pub async fn get_open_assignment(&self, alert_id: &str) -> Result<Option<AlertAssignment>> {
        let mut conn = self.pool.acquire().await?;
        fetch_open(&mut conn, alert_id).await
    }

    /// Every record for an alert in creation order
    pub async fn assignment_history(&self, alert_id: &str) -> Result<Vec<AlertAssignment>> {
        let sql = format!(
            "SELECT {} FROM alert_assignments WHERE alert_id = ? ORDER BY created_at ASC, rowid ASC",
            ASSIGNMENT_COLUMNS
        );
        let rows = sqlx::query(&sql).bind(alert_id).fetch_all(&self.pool).await?;
        rows.iter().map(assignment_from_row).collect()
    }

    /// PENDING assignments created before `cutoff`, oldest first
    pub async fn find_stale_assignments(&self, cutoff: DateTime<Utc>) -> Result<Vec<AlertAssignment>> {
        let sql = format!(
            "SELECT {} FROM alert_assignments
              WHERE status = 'PENDING' AND created_at < ?
              ORDER BY created_at ASC, rowid ASC",
            ASSIGNMENT_COLUMNS
        );
        let rows = sqlx::query(&sql).bind(cutoff).fetch_all(&self.pool).await?;
        rows.iter().map(assignment_from_row).collect()
    }

    /// Assignments created in `[start, end)` grouped by strategy and status
    pub async fn count_assignments(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<AssignmentCounts> {
        let rows = sqlx::query(
            "SELECT routing_strategy, status, COUNT(*) AS total
               FROM alert_assignments
              WHERE created_at >= ? AND created_at < ?
              GROUP BY routing_strategy, status",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        let mut counts = AssignmentCounts::default();
        for row in &rows {
            let strategy: String = row.try_get("routing_strategy")?;
            let status: String = row.try_get("status")?;
            let total: i64 = row.try_get("total")?;
            counts.rows.push((
                strategy,
                status.parse().map_err(RoutingError::internal)?,
                u64::try_from(total).unwrap_or(0),
            ));
        }
        Ok(counts)
    }
}
