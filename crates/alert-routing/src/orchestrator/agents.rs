use super::core::RoutingEngine;
use crate::agent::{AgentFilter, AgentProfile, AgentProfilePatch, AgentSnapshot, AgentWorkload};
use crate::error::Result;

impl RoutingEngine {
    pub async fn register_agent(&self, profile: AgentProfile) -> Result<AgentProfile> {
        self.directory.register(profile).await
    }

    pub async fn get_agent_profile(&self, agent_id: &str) -> Result<AgentProfile> {
        self.directory.get_profile(agent_id).await
    }

    pub async fn update_agent_profile(&self, agent_id: &str, patch: AgentProfilePatch) -> Result<AgentProfile> {
        self.directory.update_profile(agent_id, patch).await
    }

    pub async fn list_agents(&self) -> Result<Vec<AgentProfile>> {
        self.directory.list_profiles().await
    }

    /// Available agents with free capacity, optionally filtered
    pub async fn get_available_agents(&self, filter: Option<AgentFilter>) -> Result<Vec<AgentSnapshot>> {
        self.directory
            .list_available_agents(&filter.unwrap_or_default())
            .await
    }

    pub async fn get_agent_workload(&self, agent_id: &str) -> Result<AgentWorkload> {
        self.directory.get_workload(agent_id).await
    }
}
