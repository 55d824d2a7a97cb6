use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RoutingError};

/// Routing-relevant view of an agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub agent_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub max_concurrent_alerts: u32,
    #[serde(default)]
    pub territories: BTreeSet<String>,
    #[serde(default)]
    pub skills: BTreeSet<String>,
    /// Unavailable agents never receive new assignments
    #[serde(default = "default_true")]
    pub available: bool,
    /// Eligible for pool-based (round-robin) picks
    #[serde(default = "default_true")]
    pub auto_assign: bool,
}

fn default_true() -> bool {
    true
}

impl AgentProfile {
    pub fn new(agent_id: impl Into<String>, max_concurrent_alerts: u32) -> Self {
        Self {
            agent_id: agent_id.into(),
            display_name: None,
            max_concurrent_alerts,
            territories: BTreeSet::new(),
            skills: BTreeSet::new(),
            available: true,
            auto_assign: true,
        }
    }

    pub fn with_territory(mut self, territory: impl Into<String>) -> Self {
        self.territories.insert(territory.into());
        self
    }

    pub fn with_skill(mut self, skill: impl Into<String>) -> Self {
        self.skills.insert(skill.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Only reachable through direct targeting
    pub fn manual_only(mut self) -> Self {
        self.auto_assign = false;
        self
    }

    pub fn has_skills<'a, I>(&self, required: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        required.into_iter().all(|skill| self.skills.contains(skill))
    }

    pub fn validate(&self) -> Result<()> {
        if self.agent_id.trim().is_empty() {
            return Err(RoutingError::invalid_input("agent_id cannot be empty"));
        }
        if self.territories.iter().chain(self.skills.iter()).any(|v| v.trim().is_empty()) {
            return Err(RoutingError::invalid_input(format!(
                "Agent {} has a blank territory or skill",
                self.agent_id
            )));
        }
        Ok(())
    }
}

/// Partial profile update
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentProfilePatch {
    pub display_name: Option<String>,
    pub max_concurrent_alerts: Option<u32>,
    pub territories: Option<BTreeSet<String>>,
    pub skills: Option<BTreeSet<String>>,
    pub available: Option<bool>,
    pub auto_assign: Option<bool>,
}

impl AgentProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none()
            && self.max_concurrent_alerts.is_none()
            && self.territories.is_none()
            && self.skills.is_none()
            && self.available.is_none()
            && self.auto_assign.is_none()
    }

    pub fn apply(self, profile: &mut AgentProfile) {
        if let Some(name) = self.display_name {
            profile.display_name = Some(name);
        }
        if let Some(max) = self.max_concurrent_alerts {
            profile.max_concurrent_alerts = max;
        }
        if let Some(territories) = self.territories {
            profile.territories = territories;
        }
        if let Some(skills) = self.skills {
            profile.skills = skills;
        }
        if let Some(available) = self.available {
            profile.available = available;
        }
        if let Some(auto_assign) = self.auto_assign {
            profile.auto_assign = auto_assign;
        }
    }
}

/// Workload derived from the assignment store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentWorkload {
    pub active_alerts: u32,
    pub max_concurrent_alerts: u32,
    pub available_capacity: u32,
}

impl AgentWorkload {
    pub fn new(active_alerts: u32, max_concurrent_alerts: u32) -> Self {
        Self {
            active_alerts,
            max_concurrent_alerts,
            available_capacity: max_concurrent_alerts.saturating_sub(active_alerts),
        }
    }

    pub fn has_capacity(&self) -> bool {
        self.available_capacity > 0
    }
}

/// An agent together with its computed workload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub profile: AgentProfile,
    pub workload: AgentWorkload,
}

impl AgentSnapshot {
    pub fn agent_id(&self) -> &str {
        &self.profile.agent_id
    }

    /// Can take a new assignment right now (advisory)
    pub fn is_assignable(&self) -> bool {
        self.profile.available && self.workload.has_capacity()
    }
}

/// Filter for available-agent queries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentFilter {
    pub territory: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    /// Drop agents with `auto_assign = false`
    #[serde(default)]
    pub auto_assign_only: bool,
    /// Never include this agent
    #[serde(default)]
    pub exclude_agent: Option<String>,
}

impl AgentFilter {
    pub fn territory(territory: impl Into<String>) -> Self {
        Self { territory: Some(territory.into()), ..Default::default() }
    }

    pub fn skills<I, S>(skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { skills: skills.into_iter().map(Into::into).collect(), ..Default::default() }
    }

    pub fn for_auto_assign(mut self) -> Self {
        self.auto_assign_only = true;
        self
    }

    pub fn excluding(mut self, agent_id: impl Into<String>) -> Self {
        self.exclude_agent = Some(agent_id.into());
        self
    }

    pub fn matches(&self, snapshot: &AgentSnapshot) -> bool {
        let profile = &snapshot.profile;
        if !snapshot.is_assignable() {
            return false;
        }
        if self.auto_assign_only && !profile.auto_assign {
            return false;
        }
        if self.exclude_agent.as_deref() == Some(profile.agent_id.as_str()) {
            return false;
        }
        if let Some(territory) = &self.territory {
            if !profile.territories.contains(territory) {
                return false;
            }
        }
        profile.has_skills(&self.skills)
    }
}
