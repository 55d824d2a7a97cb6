//! Rule-driven routing of a single alert.
//!
//! RECEIVED -> rule loop -> ASSIGNED | ESCALATED | UNROUTABLE. Rules are
//! evaluated first-match-wins in priority order against one immutable
//! snapshot; nothing is locked across the loop, only the final reservation
//! is atomic.

use tracing::{debug, info, warn};

use super::core::RoutingEngine;
use super::types::{RouteDecision, RouteOutcome};
use crate::assignment::AlertAssignment;
use crate::error::{Result, RoutingError};
use crate::routing::{ActionOutcome, ActionScope, AlertContext};
use crate::rules::{matches_all, Action, RoutingRule};

impl RoutingEngine {
    /// Route an alert to an agent.
    ///
    /// `Unroutable` is a normal outcome, not an error. Errors are reserved for
    /// invalid input, an alert that already has an open assignment, and
    /// storage failures.
    pub async fn route(&self, alert: &AlertContext) -> Result<RouteOutcome> {
        alert.validate()?;

        if self.db.get_open_assignment(&alert.alert_id).await?.is_some() {
            return Err(RoutingError::AlreadyAssigned { alert_id: alert.alert_id.clone() });
        }

        let snapshot = self.rules.list().await?;
        let context = alert.to_value();

        for rule in snapshot.iter() {
            if !matches_all(&rule.conditions, &context) {
                continue;
            }
            debug!(alert_id = %alert.alert_id, rule_id = %rule.id, "Rule '{}' matched", rule.name);

            if let Some(outcome) = self.apply_rule(rule, alert).await? {
                return Ok(outcome);
            }
            info!(
                alert_id = %alert.alert_id,
                rule_id = %rule.id,
                "Every action of rule '{}' failed, trying next rule",
                rule.name
            );
        }

        self.route_by_default(alert).await
    }

    /// Run a matched rule; `None` means it failed and routing falls through
    async fn apply_rule(&self, rule: &RoutingRule, alert: &AlertContext) -> Result<Option<RouteOutcome>> {
        let scope = ActionScope { alert, rule: Some(rule) };
        let resolving: Vec<&Action> = rule.actions.iter().filter(|a| a.is_resolving()).collect();
        let mut resolving = resolving.into_iter().peekable();

        if resolving.peek().is_none() {
            self.fire_rule_notifications(rule, alert, None);
            info!(alert_id = %alert.alert_id, rule_id = %rule.id, "Alert handled by notify-only rule");
            return Ok(Some(RouteOutcome::Notified {
                alert_id: alert.alert_id.clone(),
                rule_id: rule.id.clone(),
            }));
        }

        for action in resolving {
            match self.executor.execute(action, scope).await? {
                ActionOutcome::Assigned(assignment) => {
                    self.fire_rule_notifications(rule, alert, Some(&assignment.assigned_agent_id));
                    return Ok(Some(assigned(&assignment)));
                }
                ActionOutcome::Escalated { queued } => {
                    self.fire_rule_notifications(rule, alert, None);
                    return Ok(Some(RouteOutcome::Escalated {
                        alert_id: alert.alert_id.clone(),
                        rule_id: Some(rule.id.clone()),
                        newly_queued: queued,
                    }));
                }
                ActionOutcome::Failed(reason) => {
                    debug!(
                        alert_id = %alert.alert_id,
                        rule_id = %rule.id,
                        action = action.kind(),
                        "{}",
                        reason
                    );
                }
            }
        }

        Ok(None)
    }

    /// Round-robin over any available auto-assign agent
    async fn route_by_default(&self, alert: &AlertContext) -> Result<RouteOutcome> {
        let scope = ActionScope { alert, rule: None };
        match self.executor.assign_by_skill(&[], scope).await? {
            ActionOutcome::Assigned(assignment) => Ok(assigned(&assignment)),
            ActionOutcome::Failed(reason) => {
                warn!(alert_id = %alert.alert_id, "Alert is unroutable: {}", reason);
                Ok(RouteOutcome::Unroutable { alert_id: alert.alert_id.clone(), reason })
            }
            ActionOutcome::Escalated { .. } => Ok(RouteOutcome::Unroutable {
                alert_id: alert.alert_id.clone(),
                reason: "default strategy cannot escalate".to_string(),
            }),
        }
    }

    fn fire_rule_notifications(&self, rule: &RoutingRule, alert: &AlertContext, agent_id: Option<&str>) {
        for action in &rule.actions {
            if let Action::Notify { channel, message } = action {
                self.executor.notify(channel, message, alert, agent_id);
            }
        }
    }
}

fn assigned(assignment: &AlertAssignment) -> RouteOutcome {
    RouteOutcome::Assigned(RouteDecision::from(assignment))
}
