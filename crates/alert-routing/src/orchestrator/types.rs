use serde::{Deserialize, Serialize};

use crate::assignment::{AlertAssignment, RoutingStrategy};
use crate::error::RoutingError;

/// Where an alert ended up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDecision {
    pub alert_id: String,
    pub agent_id: String,
    pub assignment_id: String,
    pub assignment_reason: String,
    pub routing_strategy: RoutingStrategy,
    /// Rule that matched; `None` when the default strategy placed the alert
    pub rule_id: Option<String>,
}

impl From<&AlertAssignment> for RouteDecision {
    fn from(assignment: &AlertAssignment) -> Self {
        Self {
            alert_id: assignment.alert_id.clone(),
            agent_id: assignment.assigned_agent_id.clone(),
            assignment_id: assignment.id.clone(),
            assignment_reason: assignment.assignment_reason.clone(),
            routing_strategy: assignment.routing_strategy.clone(),
            rule_id: assignment.rule_id.clone(),
        }
    }
}

/// Terminal state of one `route` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RouteOutcome {
    Assigned(RouteDecision),
    /// Flagged for the supervisor queue; no agent resolved
    Escalated {
        alert_id: String,
        rule_id: Option<String>,
        newly_queued: bool,
    },
    /// Matched a rule that only notifies
    Notified { alert_id: String, rule_id: String },
    /// Every strategy exhausted; the caller decides what to do next
    Unroutable { alert_id: String, reason: String },
}

impl RouteOutcome {
    pub fn alert_id(&self) -> &str {
        match self {
            RouteOutcome::Assigned(decision) => &decision.alert_id,
            RouteOutcome::Escalated { alert_id, .. }
            | RouteOutcome::Notified { alert_id, .. }
            | RouteOutcome::Unroutable { alert_id, .. } => alert_id,
        }
    }

    pub fn decision(&self) -> Option<&RouteDecision> {
        match self {
            RouteOutcome::Assigned(decision) => Some(decision),
            _ => None,
        }
    }

    pub fn agent_id(&self) -> Option<&str> {
        self.decision().map(|d| d.agent_id.as_str())
    }

    pub fn is_assigned(&self) -> bool {
        matches!(self, RouteOutcome::Assigned(_))
    }

    pub fn is_unroutable(&self) -> bool {
        matches!(self, RouteOutcome::Unroutable { .. })
    }
}

/// Per-alert result of a bulk assignment
#[derive(Debug)]
pub struct BulkAssignResult {
    pub alert_id: String,
    pub outcome: BulkOutcome,
}

#[derive(Debug)]
pub enum BulkOutcome {
    Assigned(AlertAssignment),
    Unroutable(String),
    Failed(RoutingError),
}

impl BulkAssignResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, BulkOutcome::Assigned(_))
    }

    pub fn assignment(&self) -> Option<&AlertAssignment> {
        match &self.outcome {
            BulkOutcome::Assigned(assignment) => Some(assignment),
            _ => None,
        }
    }
}
