//! Agent profile persistence and workload derivation.

use std::collections::BTreeSet;

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::debug;

use super::{from_json_column, to_u32, DatabaseManager};
use crate::agent::{AgentProfile, AgentSnapshot, AgentWorkload};
use crate::error::Result;

const AGENT_WITH_LOAD_SQL: &str = "SELECT a.agent_id, a.display_name, a.max_concurrent_alerts,
        a.territories, a.skills, a.available, a.auto_assign,
        (SELECT COUNT(*) FROM alert_assignments s
          WHERE s.agent_id = a.agent_id AND s.status IN ('PENDING', 'ACKNOWLEDGED')) AS active_alerts
   FROM agents a";

fn profile_from_row(row: &SqliteRow) -> Result<AgentProfile> {
    let territories: String = row.try_get("territories")?;
    let skills: String = row.try_get("skills")?;
    let max: i64 = row.try_get("max_concurrent_alerts")?;

    Ok(AgentProfile {
        agent_id: row.try_get("agent_id")?,
        display_name: row.try_get("display_name")?,
        max_concurrent_alerts: to_u32(max),
        territories: from_json_column::<BTreeSet<String>>(&territories)?,
        skills: from_json_column::<BTreeSet<String>>(&skills)?,
        available: row.try_get("available")?,
        auto_assign: row.try_get("auto_assign")?,
    })
}

fn snapshot_from_row(row: &SqliteRow) -> Result<AgentSnapshot> {
    let profile = profile_from_row(row)?;
    let active: i64 = row.try_get("active_alerts")?;
    let workload = AgentWorkload::new(to_u32(active), profile.max_concurrent_alerts);
    Ok(AgentSnapshot { profile, workload })
}

impl DatabaseManager {
    /// Insert or replace an agent profile
    pub async fn upsert_agent(&self, profile: &AgentProfile) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO agents
                (agent_id, display_name, max_concurrent_alerts, territories, skills,
                 available, auto_assign, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(agent_id) DO UPDATE SET
                display_name = excluded.display_name,
                max_concurrent_alerts = excluded.max_concurrent_alerts,
                territories = excluded.territories,
                skills = excluded.skills,
                available = excluded.available,
                auto_assign = excluded.auto_assign,
                updated_at = excluded.updated_at",
        )
        .bind(&profile.agent_id)
        .bind(&profile.display_name)
        .bind(i64::from(profile.max_concurrent_alerts))
        .bind(serde_json::to_string(&profile.territories)?)
        .bind(serde_json::to_string(&profile.skills)?)
        .bind(profile.available)
        .bind(profile.auto_assign)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(agent_id = %profile.agent_id, "Agent profile stored");
        Ok(())
    }

    pub async fn get_agent(&self, agent_id: &str) -> Result<Option<AgentProfile>> {
        let row = sqlx::query(
            "SELECT agent_id, display_name, max_concurrent_alerts, territories, skills,
                    available, auto_assign
               FROM agents WHERE agent_id = ?",
        )
        .bind(agent_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(profile_from_row).transpose()
    }

    /// All agents ordered by id
    pub async fn list_agents(&self) -> Result<Vec<AgentProfile>> {
        let rows = sqlx::query(
            "SELECT agent_id, display_name, max_concurrent_alerts, territories, skills,
                    available, auto_assign
               FROM agents ORDER BY agent_id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(profile_from_row).collect()
    }

    /// Profile plus workload counted from open assignments
    pub async fn get_agent_snapshot(&self, agent_id: &str) -> Result<Option<AgentSnapshot>> {
        let sql = format!("{} WHERE a.agent_id = ?", AGENT_WITH_LOAD_SQL);
        let row = sqlx::query(&sql).bind(agent_id).fetch_optional(&self.pool).await?;
        row.as_ref().map(snapshot_from_row).transpose()
    }

    /// Every agent with its workload, ordered by id
    pub async fn list_agent_snapshots(&self) -> Result<Vec<AgentSnapshot>> {
        let sql = format!("{} ORDER BY a.agent_id", AGENT_WITH_LOAD_SQL);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(snapshot_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_and_reload_profile() {
        let db = DatabaseManager::new_in_memory().await.unwrap();
        let profile = AgentProfile::new("agent-1", 3)
            .with_territory("west")
            .with_skill("luxury")
            .with_display_name("Ana");
        db.upsert_agent(&profile).await.unwrap();

        let loaded = db.get_agent("agent-1").await.unwrap().unwrap();
        assert_eq!(loaded, profile);

        let mut changed = profile.clone();
        changed.available = false;
        changed.max_concurrent_alerts = 5;
        db.upsert_agent(&changed).await.unwrap();
        assert_eq!(db.get_agent("agent-1").await.unwrap().unwrap(), changed);
        assert_eq!(db.list_agents().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_starts_empty() {
        let db = DatabaseManager::new_in_memory().await.unwrap();
        db.upsert_agent(&AgentProfile::new("b", 2)).await.unwrap();
        db.upsert_agent(&AgentProfile::new("a", 1)).await.unwrap();

        let snapshots = db.list_agent_snapshots().await.unwrap();
        let ids: Vec<&str> = snapshots.iter().map(|s| s.agent_id()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(snapshots[1].workload, AgentWorkload::new(0, 2));
        assert!(db.get_agent_snapshot("missing").await.unwrap().is_none());
    }
}
