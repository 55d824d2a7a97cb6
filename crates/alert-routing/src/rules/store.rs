//! Rule store: validated CRUD over the database with a cached, immutable
//! snapshot for evaluation.

use std::sync::Arc;

use tracing::{debug, info};

use super::types::{RoutingRule, RuleDraft, RulePatch};
use crate::cache::{RoutingCaches, RuleSnapshot};
use crate::database::DatabaseManager;
use crate::error::{Result, RoutingError};

/// Ordered, cached collection of routing rules
#[derive(Clone)]
pub struct RuleStore {
    db: DatabaseManager,
    caches: Arc<RoutingCaches>,
    max_fallback_depth: usize,
}

impl RuleStore {
    pub fn new(db: DatabaseManager, caches: Arc<RoutingCaches>, max_fallback_depth: usize) -> Self {
        Self { db, caches, max_fallback_depth }
    }

    /// Enabled rules in evaluation order.
    ///
    /// The returned snapshot is immutable; edits made while a caller holds it
    /// only show up in later calls.
    pub async fn list(&self) -> Result<RuleSnapshot> {
        if let Some(snapshot) = self.caches.rules.get(&()).await {
            return Ok(snapshot);
        }

        let observed = self.caches.rules.generation();
        let snapshot: RuleSnapshot = Arc::new(self.db.list_rules(false).await?);
        self.caches.rules.insert_if_current((), snapshot.clone(), observed).await;

        debug!("Loaded {} enabled routing rules", snapshot.len());
        Ok(snapshot)
    }

    /// Every rule including disabled ones, uncached
    pub async fn list_all(&self) -> Result<Vec<RoutingRule>> {
        self.db.list_rules(true).await
    }

    pub async fn get(&self, rule_id: &str) -> Result<RoutingRule> {
        self.db
            .get_rule(rule_id)
            .await?
            .ok_or_else(|| RoutingError::not_found(format!("rule {}", rule_id)))
    }

    pub async fn create(&self, draft: RuleDraft) -> Result<RoutingRule> {
        draft.validate(self.max_fallback_depth)?;
        let rule = self.db.insert_rule(&draft).await?;
        self.caches.rules.invalidate(&()).await;

        info!(rule_id = %rule.id, priority = rule.priority, "Routing rule '{}' created", rule.name);
        Ok(rule)
    }

    pub async fn update(&self, rule_id: &str, patch: RulePatch) -> Result<RoutingRule> {
        if patch.is_empty() {
            return self.get(rule_id).await;
        }

        let mut rule = self.get(rule_id).await?;
        patch.apply(&mut rule, self.max_fallback_depth)?;
        let rule = self.db.update_rule(&rule).await?;
        self.caches.rules.invalidate(&()).await;

        info!(rule_id = %rule.id, "Routing rule updated");
        Ok(rule)
    }

    pub async fn delete(&self, rule_id: &str) -> Result<()> {
        if !self.db.delete_rule(rule_id).await? {
            return Err(RoutingError::not_found(format!("rule {}", rule_id)));
        }
        self.caches.rules.invalidate(&()).await;

        info!(rule_id, "Routing rule deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::rules::{Action, Condition};
    use serde_json::json;

    async fn store() -> RuleStore {
        let db = DatabaseManager::new_in_memory().await.unwrap();
        let caches = Arc::new(RoutingCaches::new(&CacheConfig {
            rules_ttl_ms: 60_000,
            ..Default::default()
        }));
        RuleStore::new(db, caches, 3)
    }

    fn draft(name: &str, priority: i64) -> RuleDraft {
        RuleDraft::new(name, priority)
            .with_action(Action::AssignBySkill { skills: vec![], fallback: None })
    }

    #[tokio::test]
    async fn test_snapshot_is_stable_across_writes() {
        let store = store().await;
        store.create(draft("first", 10)).await.unwrap();

        let snapshot = store.list().await.unwrap();
        assert_eq!(snapshot.len(), 1);

        store.create(draft("second", 20)).await.unwrap();

        // The held snapshot is unchanged; a fresh list sees the write
        assert_eq!(snapshot.len(), 1);
        let fresh = store.list().await.unwrap();
        assert_eq!(fresh.len(), 2);
        assert_eq!(fresh[0].name, "second");
    }

    #[tokio::test]
    async fn test_invalid_rule_rejected_at_write_time() {
        let store = store().await;
        let bad = draft("bad", 1).with_condition(Condition::Regex {
            field: "alert_type".into(),
            pattern: "([".into(),
        });
        assert!(matches!(store.create(bad).await, Err(RoutingError::Configuration(_))));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_disable_and_delete_invalidate_snapshot() {
        let store = store().await;
        let rule = store
            .create(draft("r", 5).with_condition(Condition::Equals {
                field: "priority".into(),
                value: json!("high"),
            }))
            .await
            .unwrap();
        assert_eq!(store.list().await.unwrap().len(), 1);

        let patch = RulePatch { enabled: Some(false), ..Default::default() };
        store.update(&rule.id, patch).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
        assert_eq!(store.list_all().await.unwrap().len(), 1);

        store.delete(&rule.id).await.unwrap();
        assert!(matches!(store.delete(&rule.id).await, Err(RoutingError::NotFound(_))));
        assert!(matches!(store.get(&rule.id).await, Err(RoutingError::NotFound(_))));
    }
}
