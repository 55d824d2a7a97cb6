//! Routing rule, condition and action types.
//!
//! Conditions and actions are tagged enums so adding an operator or an action
//! kind forces every `match` over them to be revisited.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, RoutingError};

/// One predicate over the alert context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operator", rename_all = "snake_case")]
pub enum Condition {
    Equals { field: String, value: Value },
    NotEquals { field: String, value: Value },
    GreaterThan { field: String, value: Value },
    LessThan { field: String, value: Value },
    In { field: String, values: Vec<Value> },
    NotIn { field: String, values: Vec<Value> },
    Contains { field: String, value: Value },
    Regex { field: String, pattern: String },
}

impl Condition {
    /// Dot-path into the alert context
    pub fn field(&self) -> &str {
        match self {
            Condition::Equals { field, .. }
            | Condition::NotEquals { field, .. }
            | Condition::GreaterThan { field, .. }
            | Condition::LessThan { field, .. }
            | Condition::In { field, .. }
            | Condition::NotIn { field, .. }
            | Condition::Contains { field, .. }
            | Condition::Regex { field, .. } => field,
        }
    }

    pub fn operator(&self) -> &'static str {
        match self {
            Condition::Equals { .. } => "equals",
            Condition::NotEquals { .. } => "not_equals",
            Condition::GreaterThan { .. } => "greater_than",
            Condition::LessThan { .. } => "less_than",
            Condition::In { .. } => "in",
            Condition::NotIn { .. } => "not_in",
            Condition::Contains { .. } => "contains",
            Condition::Regex { .. } => "regex",
        }
    }

    /// Write-time legality check
    pub fn validate(&self) -> Result<()> {
        let field = self.field();
        if field.is_empty() || field.split('.').any(|segment| segment.is_empty()) {
            return Err(RoutingError::configuration(format!(
                "Condition field '{}' is not a valid dot-path",
                field
            )));
        }

        match self {
            Condition::GreaterThan { value, .. } | Condition::LessThan { value, .. } => {
                if super::evaluator::as_number(value).is_none() {
                    return Err(RoutingError::configuration(format!(
                        "{} on '{}' needs a numeric value, got {}",
                        self.operator(),
                        field,
                        value
                    )));
                }
            }
            Condition::In { values, .. } | Condition::NotIn { values, .. } => {
                if values.is_empty() {
                    return Err(RoutingError::configuration(format!(
                        "{} on '{}' needs at least one value",
                        self.operator(),
                        field
                    )));
                }
            }
            Condition::Regex { pattern, .. } => {
                Regex::new(pattern).map_err(|e| {
                    RoutingError::configuration(format!("Invalid regex '{}': {}", pattern, e))
                })?;
            }
            Condition::Equals { .. } | Condition::NotEquals { .. } | Condition::Contains { .. } => {}
        }

        Ok(())
    }
}

/// What to do when a rule matches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Fixed target, still checked for availability and capacity
    AssignToAgent {
        agent_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fallback: Option<Box<Action>>,
    },
    /// Round-robin over a territory; `None` uses the alert's own territory
    AssignToTerritory {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        territory: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fallback: Option<Box<Action>>,
    },
    /// Round-robin over agents holding every listed skill (empty = any agent)
    AssignBySkill {
        #[serde(default)]
        skills: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fallback: Option<Box<Action>>,
    },
    /// Flag for the supervisor queue
    Escalate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// Fire-and-forget notification
    Notify { channel: String, message: String },
}

impl Action {
    pub fn kind(&self) -> &'static str {
        match self {
            Action::AssignToAgent { .. } => "assign_to_agent",
            Action::AssignToTerritory { .. } => "assign_to_territory",
            Action::AssignBySkill { .. } => "assign_by_skill",
            Action::Escalate { .. } => "escalate",
            Action::Notify { .. } => "notify",
        }
    }

    /// Resolving actions end rule processing on success; `notify` never does.
    pub fn is_resolving(&self) -> bool {
        !matches!(self, Action::Notify { .. })
    }

    pub fn fallback(&self) -> Option<&Action> {
        match self {
            Action::AssignToAgent { fallback, .. }
            | Action::AssignToTerritory { fallback, .. }
            | Action::AssignBySkill { fallback, .. } => fallback.as_deref(),
            Action::Escalate { .. } | Action::Notify { .. } => None,
        }
    }

    /// Write-time legality check; `max_depth` bounds the fallback chain
    pub fn validate(&self, max_depth: usize) -> Result<()> {
        self.validate_at(0, max_depth)
    }

    fn validate_at(&self, depth: usize, max_depth: usize) -> Result<()> {
        if depth > max_depth {
            return Err(RoutingError::configuration(format!(
                "Fallback chain deeper than {}",
                max_depth
            )));
        }

        match self {
            Action::AssignToAgent { agent_id, .. } if agent_id.trim().is_empty() => {
                return Err(RoutingError::configuration("assign_to_agent needs an agent_id"));
            }
            Action::AssignToTerritory { territory: Some(t), .. } if t.trim().is_empty() => {
                return Err(RoutingError::configuration(
                    "assign_to_territory territory cannot be blank",
                ));
            }
            Action::AssignBySkill { skills, .. } if skills.iter().any(|s| s.trim().is_empty()) => {
                return Err(RoutingError::configuration("assign_by_skill has a blank skill"));
            }
            Action::Notify { channel, .. } if channel.trim().is_empty() => {
                return Err(RoutingError::configuration("notify needs a channel"));
            }
            _ => {}
        }

        if let Some(fallback) = self.fallback() {
            if !fallback.is_resolving() {
                return Err(RoutingError::configuration(
                    "notify cannot be used as a fallback",
                ));
            }
            fallback.validate_at(depth + 1, max_depth)?;
        }

        Ok(())
    }
}

/// A stored routing rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingRule {
    pub id: String,
    pub name: String,
    /// Higher is evaluated first
    pub priority: i64,
    pub enabled: bool,
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
    /// Monotonic insertion order; breaks priority ties
    pub sequence: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to create a rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDraft {
    pub name: String,
    pub priority: i64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
}

fn default_enabled() -> bool {
    true
}

/// Partial rule update
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulePatch {
    pub name: Option<String>,
    pub priority: Option<i64>,
    pub enabled: Option<bool>,
    pub conditions: Option<Vec<Condition>>,
    pub actions: Option<Vec<Action>>,
}

impl RuleDraft {
    pub fn new(name: impl Into<String>, priority: i64) -> Self {
        Self {
            name: name.into(),
            priority,
            enabled: true,
            conditions: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn validate(&self, max_fallback_depth: usize) -> Result<()> {
        validate_rule_parts(&self.name, &self.conditions, &self.actions, max_fallback_depth)
    }
}

impl RulePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.priority.is_none()
            && self.enabled.is_none()
            && self.conditions.is_none()
            && self.actions.is_none()
    }

    /// Apply onto an existing rule, validating the merged result
    pub fn apply(self, rule: &mut RoutingRule, max_fallback_depth: usize) -> Result<()> {
        let name = self.name.unwrap_or_else(|| rule.name.clone());
        let conditions = self.conditions.unwrap_or_else(|| rule.conditions.clone());
        let actions = self.actions.unwrap_or_else(|| rule.actions.clone());
        validate_rule_parts(&name, &conditions, &actions, max_fallback_depth)?;

        rule.name = name;
        rule.conditions = conditions;
        rule.actions = actions;
        if let Some(priority) = self.priority {
            rule.priority = priority;
        }
        if let Some(enabled) = self.enabled {
            rule.enabled = enabled;
        }
        Ok(())
    }
}

fn validate_rule_parts(
    name: &str,
    conditions: &[Condition],
    actions: &[Action],
    max_fallback_depth: usize,
) -> Result<()> {
    if name.trim().is_empty() {
        return Err(RoutingError::configuration("Rule name cannot be empty"));
    }
    if actions.is_empty() {
        return Err(RoutingError::configuration(format!(
            "Rule '{}' has no actions",
            name
        )));
    }
    for condition in conditions {
        condition.validate()?;
    }
    for action in actions {
        action.validate(max_fallback_depth)?;
    }
    Ok(())
}
