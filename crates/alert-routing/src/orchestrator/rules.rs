use super::core::RoutingEngine;
use crate::error::Result;
use crate::rules::{RoutingRule, RuleDraft, RulePatch};

impl RoutingEngine {
    /// Every rule, disabled ones included, in evaluation order
    pub async fn list_rules(&self) -> Result<Vec<RoutingRule>> {
        self.rules.list_all().await
    }

    pub async fn get_rule(&self, rule_id: &str) -> Result<RoutingRule> {
        self.rules.get(rule_id).await
    }

    pub async fn create_rule(&self, draft: RuleDraft) -> Result<RoutingRule> {
        self.rules.create(draft).await
    }

    pub async fn update_rule(&self, rule_id: &str, patch: RulePatch) -> Result<RoutingRule> {
        self.rules.update(rule_id, patch).await
    }

    pub async fn delete_rule(&self, rule_id: &str) -> Result<()> {
        self.rules.delete(rule_id).await
    }
}
