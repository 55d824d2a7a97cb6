//! Alert assignment records and their lifecycle.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Assignment lifecycle status
///
/// `PENDING -> ACKNOWLEDGED -> COMPLETED`, or `-> REASSIGNED`.
/// `COMPLETED` and `REASSIGNED` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentStatus {
    Pending,
    Acknowledged,
    Completed,
    Reassigned,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Pending => "PENDING",
            AssignmentStatus::Acknowledged => "ACKNOWLEDGED",
            AssignmentStatus::Completed => "COMPLETED",
            AssignmentStatus::Reassigned => "REASSIGNED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AssignmentStatus::Completed | AssignmentStatus::Reassigned)
    }

    pub fn all() -> [AssignmentStatus; 4] {
        [
            AssignmentStatus::Pending,
            AssignmentStatus::Acknowledged,
            AssignmentStatus::Completed,
            AssignmentStatus::Reassigned,
        ]
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssignmentStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(AssignmentStatus::Pending),
            "ACKNOWLEDGED" => Ok(AssignmentStatus::Acknowledged),
            "COMPLETED" => Ok(AssignmentStatus::Completed),
            "REASSIGNED" => Ok(AssignmentStatus::Reassigned),
            _ => Err(format!("Unknown assignment status: {}", s)),
        }
    }
}

/// How an assignment was decided
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "rule_id", rename_all = "snake_case")]
pub enum RoutingStrategy {
    /// A routing rule's `assign_to_agent` action, by rule id
    Rule(String),
    TerritoryBased,
    SkillBased,
    RoundRobin,
    ManualReassignment,
    Escalation,
}

impl RoutingStrategy {
    /// Stored form: the rule id for rule-driven picks, the strategy name otherwise
    pub fn as_stored(&self) -> String {
        match self {
            RoutingStrategy::Rule(rule_id) => rule_id.clone(),
            other => other.name().to_string(),
        }
    }

    /// Strategy family name (`rule` for rule-id strategies)
    pub fn name(&self) -> &'static str {
        match self {
            RoutingStrategy::Rule(_) => "rule",
            RoutingStrategy::TerritoryBased => "territory_based",
            RoutingStrategy::SkillBased => "skill_based",
            RoutingStrategy::RoundRobin => "round_robin",
            RoutingStrategy::ManualReassignment => "manual_reassignment",
            RoutingStrategy::Escalation => "escalation",
        }
    }

    /// Parse the stored form; anything that is not a known strategy name is a rule id
    pub fn from_stored(value: &str) -> Self {
        match value {
            "territory_based" => RoutingStrategy::TerritoryBased,
            "skill_based" => RoutingStrategy::SkillBased,
            "round_robin" => RoutingStrategy::RoundRobin,
            "manual_reassignment" => RoutingStrategy::ManualReassignment,
            "escalation" => RoutingStrategy::Escalation,
            rule_id => RoutingStrategy::Rule(rule_id.to_string()),
        }
    }
}

impl fmt::Display for RoutingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_stored())
    }
}

/// A persisted alert-to-agent assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertAssignment {
    pub id: String,
    pub alert_id: String,
    pub assigned_agent_id: String,
    pub assignment_reason: String,
    pub routing_strategy: RoutingStrategy,
    /// Rule that matched, even when the pick itself came from a pool strategy
    pub rule_id: Option<String>,
    pub status: AssignmentStatus,
    pub created_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl AlertAssignment {
    pub fn is_open(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// Everything needed to insert a new PENDING assignment
#[derive(Debug, Clone)]
pub struct NewAssignment {
    pub alert_id: String,
    pub agent_id: String,
    pub reason: String,
    pub strategy: RoutingStrategy,
    pub rule_id: Option<String>,
}
