mod common;

use std::sync::Arc;
use std::time::Duration;

use alert_routing::prelude::*;
use common::{assigned_id, backdate, memory_engine};

async fn stale_alert_on_rep(engine: &RoutingEngine, alert_id: &str, days: i64) -> String {
    engine.route(&AlertContext::new(alert_id, "upsell", 0.6)).await.unwrap();
    let id = assigned_id(engine, alert_id).await;
    backdate(engine, &id, days).await;
    id
}

#[tokio::test]
async fn test_stale_assignment_escalates_to_supervisor() {
    let (engine, recorder) = memory_engine().await;
    engine.register_agent(AgentProfile::new("rep", 5)).await.unwrap();
    let original = stale_alert_on_rep(&engine, "alert-1", 4).await;
    engine
        .register_agent(AgentProfile::new("boss", 5).with_skill("supervisor"))
        .await
        .unwrap();

    let report = engine.handle_stale_alerts(3).await.unwrap();
    assert_eq!(
        report,
        SweepReport { scanned: 1, escalated: 1, conflicts: 0, unroutable: 0, failed: 0 }
    );

    let sent = recorder.wait_for(1, Duration::from_secs(2)).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "supervisor");
    assert!(sent[0].1.contains("alert-1"), "{}", sent[0].1);
    assert!(sent[0].1.contains("from rep to boss"), "{}", sent[0].1);

    let history = engine.assignment_history("alert-1").await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, original);
    assert_eq!(history[0].status, AssignmentStatus::Reassigned);
    assert_eq!(history[1].assigned_agent_id, "boss");
    assert_eq!(history[1].status, AssignmentStatus::Pending);
    assert_eq!(history[1].routing_strategy, RoutingStrategy::Escalation);

    // The fresh escalation is not stale yet
    let again = engine.handle_stale_alerts(3).await.unwrap();
    assert_eq!(again, SweepReport::default());
    assert_eq!(engine.assignment_history("alert-1").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_recent_and_acknowledged_assignments_are_left_alone() {
    let (engine, _) = memory_engine().await;
    engine.register_agent(AgentProfile::new("rep", 5)).await.unwrap();

    engine.route(&AlertContext::new("fresh", "upsell", 0.6)).await.unwrap();
    stale_alert_on_rep(&engine, "old-but-seen", 10).await;
    engine.acknowledge("old-but-seen", "rep").await.unwrap();
    engine
        .register_agent(AgentProfile::new("boss", 5).with_skill("supervisor"))
        .await
        .unwrap();

    let report = engine.handle_stale_alerts(3).await.unwrap();
    assert_eq!(report.scanned, 0);
    assert_eq!(engine.get_agent_workload("rep").await.unwrap().active_alerts, 2);
}

#[tokio::test]
async fn test_falls_back_to_any_other_agent() {
    let (engine, _) = memory_engine().await;
    engine.register_agent(AgentProfile::new("rep", 5)).await.unwrap();
    stale_alert_on_rep(&engine, "alert-1", 4).await;
    engine.register_agent(AgentProfile::new("peer", 5)).await.unwrap();

    let report = engine.handle_stale_alerts(3).await.unwrap();
    assert_eq!(report.escalated, 1);
    let current = engine.get_assignment("alert-1").await.unwrap().unwrap();
    assert_eq!(current.assigned_agent_id, "peer");
}

#[tokio::test]
async fn test_no_target_queues_for_supervisors_once() {
    let (engine, recorder) = memory_engine().await;
    engine.register_agent(AgentProfile::new("rep", 5)).await.unwrap();
    let original = stale_alert_on_rep(&engine, "alert-1", 4).await;

    let report = engine.handle_stale_alerts(3).await.unwrap();
    assert_eq!(report.unroutable, 1);
    assert_eq!(report.escalated, 0);

    let current = engine.get_assignment("alert-1").await.unwrap().unwrap();
    assert_eq!(current.id, original);
    assert_eq!(current.status, AssignmentStatus::Pending);

    let queue = engine.supervisor_queue().await.unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].source, "sweeper");

    // Still stale, still queued, but nobody gets paged twice
    let again = engine.handle_stale_alerts(3).await.unwrap();
    assert_eq!(again.unroutable, 1);
    assert_eq!(engine.supervisor_queue().await.unwrap().len(), 1);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(recorder.sent().len(), 1);
}

#[tokio::test]
async fn test_storage_error_on_one_record_does_not_stop_the_sweep() {
    let (engine, _) = memory_engine().await;
    engine.register_agent(AgentProfile::new("rep", 5)).await.unwrap();
    let first = stale_alert_on_rep(&engine, "alert-1", 5).await;
    let second = stale_alert_on_rep(&engine, "alert-2", 4).await;
    engine
        .register_agent(AgentProfile::new("boss", 1).with_skill("supervisor"))
        .await
        .unwrap();
    sqlx::query(
        "CREATE TRIGGER reject_queue BEFORE INSERT ON supervisor_queue
         BEGIN SELECT RAISE(ABORT, 'queue offline'); END",
    )
    .execute(engine.database().pool())
    .await
    .unwrap();

    // alert-1 takes boss's only slot; alert-2 has no target and the queue write fails
    let report = engine.handle_stale_alerts(3).await.unwrap();
    assert_eq!(
        report,
        SweepReport { scanned: 2, escalated: 1, conflicts: 0, unroutable: 0, failed: 1 }
    );

    let moved = engine.get_assignment("alert-1").await.unwrap().unwrap();
    assert_eq!(moved.assigned_agent_id, "boss");
    assert_ne!(moved.id, first);
    let left = engine.get_assignment("alert-2").await.unwrap().unwrap();
    assert_eq!(left.id, second);
    assert_eq!(left.status, AssignmentStatus::Pending);
}

#[tokio::test]
async fn test_background_tasks_follow_sweeper_config() {
    let (engine, _) = memory_engine().await;
    assert!(engine.start_background_tasks().is_none());

    let mut config = RoutingEngineConfig::in_memory();
    config.sweeper.enabled = true;
    let engine = RoutingEngine::with_notifier(config, Arc::new(RecordingNotifier::new()))
        .await
        .unwrap();
    let handle = engine.start_background_tasks().expect("sweeper enabled");
    assert!(handle.is_running());
    handle.shutdown().await;
}

#[tokio::test]
async fn test_zero_threshold_is_rejected() {
    let (engine, _) = memory_engine().await;
    assert!(matches!(
        engine.handle_stale_alerts(0).await,
        Err(RoutingError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_background_sweeper_runs_until_shutdown() {
    let (engine, _) = memory_engine().await;
    engine.register_agent(AgentProfile::new("rep", 5)).await.unwrap();
    stale_alert_on_rep(&engine, "alert-1", 4).await;
    engine
        .register_agent(AgentProfile::new("boss", 5).with_skill("supervisor"))
        .await
        .unwrap();

    let handle = StaleAlertSweeper::new(engine.clone())
        .with_interval(Duration::from_millis(50))
        .with_max_age_days(3)
        .spawn();
    assert!(handle.is_running());

    let moved = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let current = engine.get_assignment("alert-1").await.unwrap().unwrap();
            if current.assigned_agent_id == "boss" {
                break current;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("sweeper escalated the alert");
    assert_eq!(moved.routing_strategy, RoutingStrategy::Escalation);

    handle.shutdown().await;
    assert_eq!(engine.assignment_history("alert-1").await.unwrap().len(), 2);
}
