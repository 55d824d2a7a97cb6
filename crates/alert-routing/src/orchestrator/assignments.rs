//! Assignment operations that bypass rule evaluation.

use tracing::{info, warn};

use super::core::RoutingEngine;
use super::types::{BulkAssignResult, BulkOutcome};
use crate::assignment::{AlertAssignment, AssignmentStatus, NewAssignment, RoutingStrategy};
use crate::database::{StatusGuard, SupervisorQueueEntry};
use crate::error::{Result, RoutingError};
use crate::routing::{ActionOutcome, ActionScope, AlertContext};

impl RoutingEngine {
    /// Move an alert's open assignment to `new_agent_id`.
    ///
    /// The old record becomes REASSIGNED and the new PENDING record is
    /// created in one transaction; on any failure neither happens.
    pub async fn reassign(&self, alert_id: &str, new_agent_id: &str, reason: &str) -> Result<AlertAssignment> {
        let open = [AssignmentStatus::Pending, AssignmentStatus::Acknowledged];
        let new = NewAssignment {
            alert_id: alert_id.to_string(),
            agent_id: new_agent_id.to_string(),
            reason: reason.to_string(),
            strategy: RoutingStrategy::ManualReassignment,
            rule_id: None,
        };

        let (_, created) = self.directory.reassign(StatusGuard::new(alert_id, &open), &new).await?;
        Ok(created)
    }

    /// Assign many alerts without rule evaluation.
    ///
    /// With a `target` every alert is reserved against that agent until its
    /// capacity runs out; otherwise each goes through the default
    /// round-robin strategy. One failure never aborts the batch.
    pub async fn bulk_assign(&self, alert_ids: &[String], target: Option<&str>) -> Result<Vec<BulkAssignResult>> {
        let max = self.config.routing.max_bulk_size;
        if alert_ids.len() > max {
            return Err(RoutingError::invalid_input(format!(
                "bulk assignment of {} alerts exceeds the limit of {}",
                alert_ids.len(),
                max
            )));
        }

        let mut results = Vec::with_capacity(alert_ids.len());
        for alert_id in alert_ids {
            let outcome = match target {
                Some(agent_id) => self.bulk_to_agent(alert_id, agent_id).await,
                None => self.bulk_by_default(alert_id).await,
            };
            if let BulkOutcome::Failed(e) = &outcome {
                warn!(alert_id = %alert_id, "Bulk assignment failed: {}", e);
            }
            results.push(BulkAssignResult { alert_id: alert_id.clone(), outcome });
        }

        let assigned = results.iter().filter(|r| r.is_success()).count();
        info!("Bulk assignment placed {} of {} alerts", assigned, results.len());
        Ok(results)
    }

    async fn bulk_to_agent(&self, alert_id: &str, agent_id: &str) -> BulkOutcome {
        let new = NewAssignment {
            alert_id: alert_id.to_string(),
            agent_id: agent_id.to_string(),
            reason: format!("bulk assignment to {}", agent_id),
            strategy: RoutingStrategy::ManualReassignment,
            rule_id: None,
        };
        match self.directory.reserve_slot(&new).await {
            Ok(assignment) => BulkOutcome::Assigned(assignment),
            Err(e) => BulkOutcome::Failed(e),
        }
    }

    async fn bulk_by_default(&self, alert_id: &str) -> BulkOutcome {
        if alert_id.trim().is_empty() {
            return BulkOutcome::Failed(RoutingError::invalid_input("alert_id cannot be empty"));
        }

        let alert = AlertContext::new(alert_id, "bulk_assignment", 0.0);
        let scope = ActionScope { alert: &alert, rule: None };
        match self.executor.assign_by_skill(&[], scope).await {
            Ok(ActionOutcome::Assigned(assignment)) => BulkOutcome::Assigned(assignment),
            Ok(ActionOutcome::Failed(reason)) => BulkOutcome::Unroutable(reason),
            Ok(ActionOutcome::Escalated { .. }) => {
                BulkOutcome::Unroutable("default strategy cannot escalate".to_string())
            }
            Err(e) => BulkOutcome::Failed(e),
        }
    }

    /// PENDING -> ACKNOWLEDGED by the assigned agent
    pub async fn acknowledge(&self, alert_id: &str, agent_id: &str) -> Result<AlertAssignment> {
        let assignment = self.directory.acknowledge(alert_id, agent_id).await?;
        info!(alert_id, agent_id, "Assignment acknowledged");
        Ok(assignment)
    }

    /// PENDING/ACKNOWLEDGED -> COMPLETED
    pub async fn complete(&self, alert_id: &str) -> Result<AlertAssignment> {
        let assignment = self.directory.complete(alert_id).await?;
        info!(alert_id, agent_id = %assignment.assigned_agent_id, "Assignment completed");
        Ok(assignment)
    }

    /// The alert's open assignment, if any
    pub async fn get_assignment(&self, alert_id: &str) -> Result<Option<AlertAssignment>> {
        self.db.get_open_assignment(alert_id).await
    }

    /// Every assignment record for the alert, oldest first
    pub async fn assignment_history(&self, alert_id: &str) -> Result<Vec<AlertAssignment>> {
        self.db.assignment_history(alert_id).await
    }

    /// Alerts waiting for a supervisor decision
    pub async fn supervisor_queue(&self) -> Result<Vec<SupervisorQueueEntry>> {
        self.db.list_supervisor_queue().await
    }
}
