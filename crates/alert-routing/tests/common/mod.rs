#![allow(dead_code)]

use std::sync::Arc;

use alert_routing::config::DatabaseConfig;
use alert_routing::prelude::*;
use chrono::{Duration, Utc};
use tempfile::TempDir;

/// Engine over a fresh in-memory database with a recording notifier
pub async fn memory_engine() -> (RoutingEngine, Arc<RecordingNotifier>) {
    let recorder = Arc::new(RecordingNotifier::new());
    let engine = RoutingEngine::with_notifier(RoutingEngineConfig::in_memory(), recorder.clone())
        .await
        .expect("engine");
    (engine, recorder)
}

/// Engine over a temp-file database so several pooled connections contend
pub async fn file_engine() -> (RoutingEngine, TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("routing.db");

    let mut config = RoutingEngineConfig::default();
    config.database = DatabaseConfig {
        url: format!("sqlite://{}?mode=rwc", path.display()),
        max_connections: 8,
        busy_timeout_ms: 10_000,
    };

    let engine = RoutingEngine::new(config).await.expect("engine");
    (engine, dir)
}

pub fn catch_all(name: &str, priority: i64) -> RuleDraft {
    RuleDraft::new(name, priority).with_action(Action::AssignBySkill { skills: vec![], fallback: None })
}

/// Push an assignment's creation time into the past
pub async fn backdate(engine: &RoutingEngine, assignment_id: &str, days: i64) {
    sqlx::query("UPDATE alert_assignments SET created_at = ? WHERE assignment_id = ?")
        .bind(Utc::now() - Duration::days(days))
        .bind(assignment_id)
        .execute(engine.database().pool())
        .await
        .expect("backdate");
}

pub async fn assigned_id(engine: &RoutingEngine, alert_id: &str) -> String {
    engine
        .get_assignment(alert_id)
        .await
        .expect("lookup")
        .expect("open assignment")
        .id
}
