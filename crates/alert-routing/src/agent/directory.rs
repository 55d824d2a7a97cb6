//! Agent directory / workload tracker.

use std::sync::Arc;

use tracing::{debug, info};

use super::types::{AgentFilter, AgentProfile, AgentProfilePatch, AgentSnapshot, AgentWorkload};
use crate::assignment::{AlertAssignment, NewAssignment};
use crate::cache::RoutingCaches;
use crate::database::{DatabaseManager, StatusGuard};
use crate::error::{Result, RoutingError};

/// Agent profiles plus derived workload and atomic slot reservation
#[derive(Clone)]
pub struct AgentDirectory {
    db: DatabaseManager,
    caches: Arc<RoutingCaches>,
}

impl AgentDirectory {
    pub fn new(db: DatabaseManager, caches: Arc<RoutingCaches>) -> Self {
        Self { db, caches }
    }

    /// Insert or replace a profile
    pub async fn register(&self, profile: AgentProfile) -> Result<AgentProfile> {
        profile.validate()?;
        self.db.upsert_agent(&profile).await?;
        self.caches.workloads.invalidate(&profile.agent_id).await;

        info!(agent_id = %profile.agent_id, max = profile.max_concurrent_alerts, "Agent registered");
        Ok(profile)
    }

    pub async fn get_profile(&self, agent_id: &str) -> Result<AgentProfile> {
        self.db
            .get_agent(agent_id)
            .await?
            .ok_or_else(|| RoutingError::not_found(format!("agent {}", agent_id)))
    }

    pub async fn update_profile(&self, agent_id: &str, patch: AgentProfilePatch) -> Result<AgentProfile> {
        let mut profile = self.get_profile(agent_id).await?;
        if patch.is_empty() {
            return Ok(profile);
        }

        patch.apply(&mut profile);
        profile.validate()?;
        self.db.upsert_agent(&profile).await?;
        self.caches.workloads.invalidate(&profile.agent_id).await;

        info!(agent_id, available = profile.available, "Agent profile updated");
        Ok(profile)
    }

    pub async fn list_profiles(&self) -> Result<Vec<AgentProfile>> {
        self.db.list_agents().await
    }

    /// Active alerts against capacity, derived from the assignment store
    pub async fn get_workload(&self, agent_id: &str) -> Result<AgentWorkload> {
        let key = agent_id.to_string();
        if let Some(workload) = self.caches.workloads.get(&key).await {
            return Ok(workload);
        }

        let observed = self.caches.workloads.generation();
        let snapshot = self
            .db
            .get_agent_snapshot(agent_id)
            .await?
            .ok_or_else(|| RoutingError::not_found(format!("agent {}", agent_id)))?;
        self.caches
            .workloads
            .insert_if_current(key, snapshot.workload, observed)
            .await;

        Ok(snapshot.workload)
    }

    /// Available agents with free capacity matching `filter`, ordered by id
    pub async fn list_available_agents(&self, filter: &AgentFilter) -> Result<Vec<AgentSnapshot>> {
        let agents: Vec<AgentSnapshot> = self
            .db
            .list_agent_snapshots()
            .await?
            .into_iter()
            .filter(|snapshot| filter.matches(snapshot))
            .collect();

        debug!(
            territory = ?filter.territory,
            skills = ?filter.skills,
            "{} candidate agents",
            agents.len()
        );
        Ok(agents)
    }

    /// Transactional check-and-reserve against the assignment store
    pub async fn reserve_slot(&self, new: &NewAssignment) -> Result<AlertAssignment> {
        let result = self.db.reserve_slot(new).await;
        if result.is_ok() {
            self.caches.workloads.invalidate(&new.agent_id).await;
        }
        result
    }

    /// Atomic old -> REASSIGNED plus new PENDING
    pub async fn reassign(
        &self,
        guard: StatusGuard<'_>,
        new: &NewAssignment,
    ) -> Result<(AlertAssignment, AlertAssignment)> {
        let (old, created) = self.db.reassign_atomic(guard, new).await?;
        self.caches.workloads.invalidate(&old.assigned_agent_id).await;
        self.caches.workloads.invalidate(&created.assigned_agent_id).await;
        Ok((old, created))
    }

    pub async fn acknowledge(&self, alert_id: &str, agent_id: &str) -> Result<AlertAssignment> {
        let assignment = self.db.acknowledge_assignment(alert_id, agent_id).await?;
        self.caches.workloads.invalidate(&assignment.assigned_agent_id).await;
        Ok(assignment)
    }

    pub async fn complete(&self, alert_id: &str) -> Result<AlertAssignment> {
        let assignment = self.db.complete_assignment(alert_id).await?;
        self.caches.workloads.invalidate(&assignment.assigned_agent_id).await;
        Ok(assignment)
    }
}
