//! Action executor: resolves routing actions against the agent directory.
//!
//! An action that cannot place the alert (no candidate, target full or
//! unavailable, every candidate lost its reservation race) reports
//! [`ActionOutcome::Failed`] so the caller can try the fallback or move on.
//! Only infrastructure errors come back as `Err`.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::context::AlertContext;
use super::round_robin::{PoolKey, RoundRobinSelector};
use crate::agent::{AgentDirectory, AgentFilter};
use crate::assignment::{AlertAssignment, AssignmentStatus, NewAssignment, RoutingStrategy};
use crate::database::{DatabaseManager, StatusGuard};
use crate::error::{Result, RoutingError};
use crate::notify::Notifier;
use crate::rules::{Action, RoutingRule};

/// Result of executing one action (after its fallback chain)
#[derive(Debug, Clone)]
pub enum ActionOutcome {
    Assigned(AlertAssignment),
    /// Flagged for supervisors; `queued` is false when it already was
    Escalated { queued: bool },
    Failed(String),
}

/// How a pool pick persists its choice
#[derive(Debug, Clone, Copy)]
pub enum Placement<'a> {
    /// New PENDING assignment
    Fresh,
    /// Replace the guarded open assignment
    Replace(StatusGuard<'a>),
}

/// Outcome of re-placing a stale assignment
#[derive(Debug, Clone)]
pub enum StaleOutcome {
    Reassigned(AlertAssignment),
    /// Someone else moved the record first
    Conflict,
    /// No agent could take it; left PENDING and queued for supervisors
    Queued { newly_queued: bool },
}

/// Alert plus the rule (if any) on whose behalf an action runs
#[derive(Debug, Clone, Copy)]
pub struct ActionScope<'a> {
    pub alert: &'a AlertContext,
    pub rule: Option<&'a RoutingRule>,
}

impl<'a> ActionScope<'a> {
    fn origin(&self) -> String {
        match self.rule {
            Some(rule) => format!("rule '{}'", rule.name),
            None => "default strategy".to_string(),
        }
    }

    fn rule_id(&self) -> Option<String> {
        self.rule.map(|rule| rule.id.clone())
    }
}

/// Resolves actions into assignments, escalations and notifications
#[derive(Clone)]
pub struct ActionExecutor {
    db: DatabaseManager,
    directory: AgentDirectory,
    selector: Arc<RoundRobinSelector>,
    notifier: Notifier,
    escalation_skill: String,
    escalation_channel: String,
}

impl ActionExecutor {
    pub fn new(
        db: DatabaseManager,
        directory: AgentDirectory,
        selector: Arc<RoundRobinSelector>,
        notifier: Notifier,
        escalation_skill: impl Into<String>,
        escalation_channel: impl Into<String>,
    ) -> Self {
        Self {
            db,
            directory,
            selector,
            notifier,
            escalation_skill: escalation_skill.into(),
            escalation_channel: escalation_channel.into(),
        }
    }

    pub fn selector(&self) -> &RoundRobinSelector {
        &self.selector
    }

    /// Execute a resolving action, walking its fallback chain on failure
    pub async fn execute(&self, action: &Action, scope: ActionScope<'_>) -> Result<ActionOutcome> {
        let mut current = Some(action);
        let mut last_failure = String::new();

        while let Some(action) = current {
            match self.execute_one(action, scope).await? {
                ActionOutcome::Failed(reason) => {
                    debug!(
                        alert_id = %scope.alert.alert_id,
                        action = action.kind(),
                        "Action failed: {}",
                        reason
                    );
                    last_failure = reason;
                    current = action.fallback();
                }
                resolved => return Ok(resolved),
            }
        }

        Ok(ActionOutcome::Failed(last_failure))
    }

    async fn execute_one(&self, action: &Action, scope: ActionScope<'_>) -> Result<ActionOutcome> {
        match action {
            Action::AssignToAgent { agent_id, .. } => self.assign_to_agent(agent_id, scope).await,
            Action::AssignToTerritory { territory, .. } => {
                let Some(territory) = territory.as_ref().or(scope.alert.territory.as_ref()) else {
                    return Ok(ActionOutcome::Failed("alert has no territory".to_string()));
                };
                self.assign_from_pool(
                    PoolKey::Territory(territory.clone()),
                    AgentFilter::territory(territory.clone()).for_auto_assign(),
                    RoutingStrategy::TerritoryBased,
                    scope,
                )
                .await
            }
            Action::AssignBySkill { skills, .. } => self.assign_by_skill(skills, scope).await,
            Action::Escalate { reason } => {
                let reason = reason
                    .clone()
                    .unwrap_or_else(|| format!("escalated by {}", scope.origin()));
                let queued = self.escalate(scope, &reason).await?;
                Ok(ActionOutcome::Escalated { queued })
            }
            Action::Notify { .. } => Ok(ActionOutcome::Failed(
                "notify is a side effect, not a resolving action".to_string(),
            )),
        }
    }

    /// Fixed target: no silent reroute to another agent
    async fn assign_to_agent(&self, agent_id: &str, scope: ActionScope<'_>) -> Result<ActionOutcome> {
        let strategy = match scope.rule {
            Some(rule) => RoutingStrategy::Rule(rule.id.clone()),
            None => RoutingStrategy::ManualReassignment,
        };
        let new = NewAssignment {
            alert_id: scope.alert.alert_id.clone(),
            agent_id: agent_id.to_string(),
            reason: format!("{} assigned agent {}", scope.origin(), agent_id),
            strategy,
            rule_id: scope.rule_id(),
        };

        match self.directory.reserve_slot(&new).await {
            Ok(assignment) => Ok(ActionOutcome::Assigned(assignment)),
            Err(e) if falls_through(&e) => Ok(ActionOutcome::Failed(e.to_string())),
            Err(e) => Err(e),
        }
    }

    /// Skill pool; an empty skill list is the any-agent round-robin pool
    pub async fn assign_by_skill(&self, skills: &[String], scope: ActionScope<'_>) -> Result<ActionOutcome> {
        let key = PoolKey::skills(skills.iter().cloned());
        let strategy = if key == PoolKey::Any {
            RoutingStrategy::RoundRobin
        } else {
            RoutingStrategy::SkillBased
        };
        let filter = AgentFilter::skills(skills.iter().cloned()).for_auto_assign();
        self.assign_from_pool(key, filter, strategy, scope).await
    }

    async fn assign_from_pool(
        &self,
        key: PoolKey,
        filter: AgentFilter,
        strategy: RoutingStrategy,
        scope: ActionScope<'_>,
    ) -> Result<ActionOutcome> {
        let reason = format!("{}: {} pick from {}", scope.origin(), strategy.name(), key);
        let picked = self
            .pick_from_pool(
                &key,
                &filter,
                Placement::Fresh,
                &scope.alert.alert_id,
                &reason,
                strategy,
                scope.rule_id(),
            )
            .await?;

        Ok(match picked {
            Some(assignment) => ActionOutcome::Assigned(assignment),
            None => ActionOutcome::Failed(format!("no available agent in pool {}", key)),
        })
    }

    /// Try pool candidates in rotation order until one reservation sticks.
    ///
    /// The pointer only advances on success. A `Replace` placement that hits
    /// a stale-state conflict stops immediately: the record is gone.
    pub async fn pick_from_pool(
        &self,
        key: &PoolKey,
        filter: &AgentFilter,
        placement: Placement<'_>,
        alert_id: &str,
        reason: &str,
        strategy: RoutingStrategy,
        rule_id: Option<String>,
    ) -> Result<Option<AlertAssignment>> {
        let candidates = self.directory.list_available_agents(filter).await?;

        for index in self.selector.rotation(key, &candidates) {
            let agent_id = candidates[index].agent_id();
            let new = NewAssignment {
                alert_id: alert_id.to_string(),
                agent_id: agent_id.to_string(),
                reason: reason.to_string(),
                strategy: strategy.clone(),
                rule_id: rule_id.clone(),
            };

            let result = match placement {
                Placement::Fresh => self.directory.reserve_slot(&new).await,
                Placement::Replace(guard) => {
                    self.directory.reassign(guard, &new).await.map(|(_, created)| created)
                }
            };

            match result {
                Ok(assignment) => {
                    self.selector.advance(key.clone(), index);
                    return Ok(Some(assignment));
                }
                Err(e @ RoutingError::StaleStateConflict { .. }) => return Err(e),
                Err(e) if falls_through(&e) => {
                    warn!(alert_id, agent_id, pool = %key, "Candidate rejected: {}", e);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(None)
    }

    /// Queue for supervisors and notify the escalation channel
    async fn escalate(&self, scope: ActionScope<'_>, reason: &str) -> Result<bool> {
        let alert_id = &scope.alert.alert_id;
        let rule_id = scope.rule.map(|rule| rule.id.as_str());
        let queued = self.db.enqueue_for_supervisor(alert_id, reason, "rule", rule_id).await?;

        if queued {
            info!(alert_id = %alert_id, "Alert escalated to supervisor queue: {}", reason);
            self.notifier.fire(
                self.escalation_channel.clone(),
                format!("Alert {} needs supervisor attention: {}", alert_id, reason),
            );
        }
        Ok(queued)
    }

    /// Move a stale PENDING assignment to an escalation target.
    ///
    /// Agents holding the escalation skill are tried first, then any other
    /// auto-assign agent. With no taker the record stays PENDING and the alert
    /// is queued for supervisors.
    pub async fn escalate_stale(&self, stale: &AlertAssignment) -> Result<StaleOutcome> {
        let pending = [AssignmentStatus::Pending];
        let guard = StatusGuard::new(&stale.alert_id, &pending).pinned(&stale.id);
        let current = stale.assigned_agent_id.as_str();

        let pools = [
            (
                PoolKey::Escalation(self.escalation_skill.clone()),
                AgentFilter::skills([self.escalation_skill.clone()])
                    .for_auto_assign()
                    .excluding(current),
            ),
            (PoolKey::Any, AgentFilter::default().for_auto_assign().excluding(current)),
        ];

        for (key, filter) in &pools {
            let reason = format!(
                "unacknowledged since {}; escalated from {} via {}",
                stale.created_at.format("%Y-%m-%d %H:%M"),
                current,
                key
            );
            let picked = self
                .pick_from_pool(
                    key,
                    filter,
                    Placement::Replace(guard),
                    &stale.alert_id,
                    &reason,
                    RoutingStrategy::Escalation,
                    stale.rule_id.clone(),
                )
                .await;

            match picked {
                Ok(Some(assignment)) => {
                    self.notifier.fire(
                        self.escalation_channel.clone(),
                        format!(
                            "Alert {} escalated from {} to {} after waiting since {}",
                            stale.alert_id,
                            current,
                            assignment.assigned_agent_id,
                            stale.created_at.format("%Y-%m-%d %H:%M")
                        ),
                    );
                    return Ok(StaleOutcome::Reassigned(assignment));
                }
                Ok(None) => continue,
                Err(RoutingError::StaleStateConflict { .. }) => return Ok(StaleOutcome::Conflict),
                Err(e) => return Err(e),
            }
        }

        let still_pending = self
            .db
            .get_open_assignment(&stale.alert_id)
            .await?
            .is_some_and(|open| open.id == stale.id && open.status == AssignmentStatus::Pending);
        if !still_pending {
            return Ok(StaleOutcome::Conflict);
        }

        let newly_queued = self
            .db
            .enqueue_for_supervisor(
                &stale.alert_id,
                "stale assignment with no escalation target",
                "sweeper",
                stale.rule_id.as_deref(),
            )
            .await?;
        if newly_queued {
            self.notifier.fire(
                self.escalation_channel.clone(),
                format!(
                    "Alert {} has been pending with {} since {} and no escalation target is free",
                    stale.alert_id, current, stale.created_at
                ),
            );
        }
        Ok(StaleOutcome::Queued { newly_queued })
    }

    /// Dispatch a rule's notify action after the rule resolved
    pub fn notify(&self, channel: &str, message: &str, alert: &AlertContext, agent_id: Option<&str>) {
        let message = message
            .replace("{alert_id}", &alert.alert_id)
            .replace("{alert_type}", &alert.alert_type)
            .replace("{agent_id}", agent_id.unwrap_or("unassigned"));
        self.notifier.fire(channel.to_string(), message);
    }
}

/// Errors that mean "try something else" rather than "stop routing"
fn falls_through(err: &RoutingError) -> bool {
    err.is_transient() || matches!(err, RoutingError::NotFound(_))
}
