//! Routing rule persistence. Conditions and actions are stored as tagged JSON.

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::warn;
use uuid::Uuid;

use super::{from_json_column, DatabaseManager};
use crate::error::{Result, RoutingError};
use crate::rules::{RoutingRule, RuleDraft};

const RULE_COLUMNS: &str =
    "rule_id, sequence, name, priority, enabled, conditions, actions, created_at, updated_at";

fn rule_from_row(row: &SqliteRow) -> Result<RoutingRule> {
    let conditions: String = row.try_get("conditions")?;
    let actions: String = row.try_get("actions")?;

    Ok(RoutingRule {
        id: row.try_get("rule_id")?,
        name: row.try_get("name")?,
        priority: row.try_get("priority")?,
        enabled: row.try_get("enabled")?,
        conditions: from_json_column(&conditions)?,
        actions: from_json_column(&actions)?,
        sequence: row.try_get("sequence")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

impl DatabaseManager {
    /// Store a validated draft and return the persisted rule
    pub async fn insert_rule(&self, draft: &RuleDraft) -> Result<RoutingRule> {
        let rule_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO routing_rules
                (rule_id, name, priority, enabled, conditions, actions, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&rule_id)
        .bind(&draft.name)
        .bind(draft.priority)
        .bind(draft.enabled)
        .bind(serde_json::to_string(&draft.conditions)?)
        .bind(serde_json::to_string(&draft.actions)?)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.get_rule(&rule_id)
            .await?
            .ok_or_else(|| RoutingError::internal(format!("Rule {} vanished after insert", rule_id)))
    }

    pub async fn get_rule(&self, rule_id: &str) -> Result<Option<RoutingRule>> {
        let sql = format!("SELECT {} FROM routing_rules WHERE rule_id = ?", RULE_COLUMNS);
        let row = sqlx::query(&sql).bind(rule_id).fetch_optional(&self.pool).await?;
        row.as_ref().map(rule_from_row).transpose()
    }

    /// Rules in evaluation order: priority descending, then creation order.
    ///
    /// Rows whose stored conditions/actions no longer decode are logged and skipped.
    pub async fn list_rules(&self, include_disabled: bool) -> Result<Vec<RoutingRule>> {
        let sql = format!(
            "SELECT {} FROM routing_rules {} ORDER BY priority DESC, sequence ASC, rule_id ASC",
            RULE_COLUMNS,
            if include_disabled { "" } else { "WHERE enabled = 1" }
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        let mut rules = Vec::with_capacity(rows.len());
        for row in &rows {
            match rule_from_row(row) {
                Ok(rule) => rules.push(rule),
                Err(e) => {
                    let rule_id: String = row.try_get("rule_id").unwrap_or_default();
                    warn!(rule_id = %rule_id, "Skipping malformed routing rule: {}", e);
                }
            }
        }
        Ok(rules)
    }

    /// Persist every mutable column of an existing rule
    pub async fn update_rule(&self, rule: &RoutingRule) -> Result<RoutingRule> {
        let result = sqlx::query(
            "UPDATE routing_rules
                SET name = ?, priority = ?, enabled = ?, conditions = ?, actions = ?, updated_at = ?
              WHERE rule_id = ?",
        )
        .bind(&rule.name)
        .bind(rule.priority)
        .bind(rule.enabled)
        .bind(serde_json::to_string(&rule.conditions)?)
        .bind(serde_json::to_string(&rule.actions)?)
        .bind(Utc::now())
        .bind(&rule.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RoutingError::not_found(format!("rule {}", rule.id)));
        }

        self.get_rule(&rule.id)
            .await?
            .ok_or_else(|| RoutingError::not_found(format!("rule {}", rule.id)))
    }

    /// Returns false when the rule did not exist
    pub async fn delete_rule(&self, rule_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM routing_rules WHERE rule_id = ?")
            .bind(rule_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
