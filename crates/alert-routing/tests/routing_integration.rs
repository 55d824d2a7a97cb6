//! End-to-end routing behaviour against an in-memory store.

mod common;

use std::collections::HashMap;
use std::time::Duration;

use alert_routing::prelude::*;
use common::{catch_all, memory_engine};
use serde_json::json;

fn confidence_above(threshold: f64) -> Condition {
    Condition::GreaterThan { field: "confidence".into(), value: json!(threshold) }
}

fn to_agent(agent_id: &str) -> Action {
    Action::AssignToAgent { agent_id: agent_id.into(), fallback: None }
}

#[tokio::test]
async fn test_failed_skill_rule_falls_through_to_round_robin_catch_all() {
    let (engine, _) = memory_engine().await;
    engine.register_agent(AgentProfile::new("generalist", 5)).await.unwrap();

    engine
        .create_rule(
            RuleDraft::new("luxury", 100)
                .with_condition(confidence_above(0.8))
                .with_action(Action::AssignBySkill { skills: vec!["luxury".into()], fallback: None }),
        )
        .await
        .unwrap();
    let catch_all = engine.create_rule(catch_all("catch-all", 10)).await.unwrap();

    let outcome = engine.route(&AlertContext::new("alert-1", "upsell", 0.9)).await.unwrap();
    let decision = outcome.decision().expect("assigned");

    assert_eq!(decision.agent_id, "generalist");
    assert_eq!(decision.routing_strategy, RoutingStrategy::RoundRobin);
    assert_eq!(decision.rule_id.as_deref(), Some(catch_all.id.as_str()));

    let stored = engine.get_assignment("alert-1").await.unwrap().unwrap();
    assert_eq!(stored.routing_strategy, RoutingStrategy::RoundRobin);
    assert_eq!(stored.status, AssignmentStatus::Pending);
}

#[tokio::test]
async fn test_higher_priority_rule_preempts_regardless_of_creation_order() {
    let (engine, _) = memory_engine().await;
    engine.register_agent(AgentProfile::new("low-agent", 5)).await.unwrap();
    engine.register_agent(AgentProfile::new("high-agent", 5)).await.unwrap();

    engine.create_rule(RuleDraft::new("low", 10).with_action(to_agent("low-agent"))).await.unwrap();
    let high = engine
        .create_rule(RuleDraft::new("high", 50).with_action(to_agent("high-agent")))
        .await
        .unwrap();

    let outcome = engine.route(&AlertContext::new("alert-1", "upsell", 0.5)).await.unwrap();
    assert_eq!(outcome.agent_id(), Some("high-agent"));
    assert_eq!(
        outcome.decision().unwrap().routing_strategy,
        RoutingStrategy::Rule(high.id.clone())
    );
}

#[tokio::test]
async fn test_rule_needs_every_condition() {
    let (engine, _) = memory_engine().await;
    engine.register_agent(AgentProfile::new("generalist", 10)).await.unwrap();
    engine.register_agent(AgentProfile::new("west-lead", 10).manual_only()).await.unwrap();

    engine
        .create_rule(
            RuleDraft::new("west vip", 100)
                .with_condition(confidence_above(0.8))
                .with_condition(Condition::Equals { field: "territory".into(), value: json!("west") })
                .with_action(to_agent("west-lead")),
        )
        .await
        .unwrap();

    let both = AlertContext::new("a", "upsell", 0.9).with_territory("west");
    let wrong_territory = AlertContext::new("b", "upsell", 0.9).with_territory("east");
    let low_confidence = AlertContext::new("c", "upsell", 0.5).with_territory("west");

    assert_eq!(engine.route(&both).await.unwrap().agent_id(), Some("west-lead"));
    assert_eq!(engine.route(&wrong_territory).await.unwrap().agent_id(), Some("generalist"));
    assert_eq!(engine.route(&low_confidence).await.unwrap().agent_id(), Some("generalist"));
}

#[tokio::test]
async fn test_round_robin_distributes_evenly() {
    let (engine, _) = memory_engine().await;
    for id in ["agent-a", "agent-b", "agent-c"] {
        engine.register_agent(AgentProfile::new(id, 10)).await.unwrap();
    }

    let mut per_agent: HashMap<String, usize> = HashMap::new();
    for i in 0..9 {
        let outcome = engine
            .route(&AlertContext::new(format!("alert-{}", i), "upsell", 0.5))
            .await
            .unwrap();
        *per_agent.entry(outcome.agent_id().unwrap().to_string()).or_default() += 1;
    }

    assert_eq!(per_agent.len(), 3);
    assert!(per_agent.values().all(|&count| count == 3), "{:?}", per_agent);
}

#[tokio::test]
async fn test_unroutable_is_a_value_not_an_error() {
    let (engine, _) = memory_engine().await;
    engine.register_agent(AgentProfile::new("away", 5).unavailable()).await.unwrap();

    let outcome = engine.route(&AlertContext::new("alert-1", "upsell", 0.5)).await.unwrap();
    assert!(outcome.is_unroutable());
    assert!(engine.get_assignment("alert-1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_routing_an_assigned_alert_is_rejected() {
    let (engine, _) = memory_engine().await;
    engine.register_agent(AgentProfile::new("a1", 5)).await.unwrap();
    let alert = AlertContext::new("alert-1", "upsell", 0.5);

    engine.route(&alert).await.unwrap();
    assert!(matches!(
        engine.route(&alert).await,
        Err(RoutingError::AlreadyAssigned { .. })
    ));
}

#[tokio::test]
async fn test_notifications_fire_only_after_the_rule_resolves() {
    let (engine, recorder) = memory_engine().await;
    engine.register_agent(AgentProfile::new("full", 0)).await.unwrap();
    engine.register_agent(AgentProfile::new("rep", 5)).await.unwrap();

    engine
        .create_rule(
            RuleDraft::new("doomed", 100)
                .with_condition(Condition::Equals { field: "alert_type".into(), value: json!("renewal") })
                .with_action(to_agent("full"))
                .with_action(Action::Notify { channel: "never".into(), message: "should not fire".into() }),
        )
        .await
        .unwrap();
    engine
        .create_rule(
            catch_all("announce", 10).with_action(Action::Notify {
                channel: "sales".into(),
                message: "{alert_id} -> {agent_id}".into(),
            }),
        )
        .await
        .unwrap();

    let outcome = engine.route(&AlertContext::new("alert-7", "renewal", 0.5)).await.unwrap();
    assert_eq!(outcome.agent_id(), Some("rep"));

    let sent = recorder.wait_for(1, Duration::from_secs(2)).await;
    assert_eq!(sent, vec![("sales".to_string(), "alert-7 -> rep".to_string())]);
}

#[tokio::test]
async fn test_notify_only_rule_is_terminal() {
    let (engine, recorder) = memory_engine().await;
    engine.register_agent(AgentProfile::new("rep", 5)).await.unwrap();

    let rule = engine
        .create_rule(
            RuleDraft::new("fyi", 100)
                .with_condition(Condition::Equals { field: "alert_type".into(), value: json!("fyi") })
                .with_action(Action::Notify { channel: "digest".into(), message: "{alert_type}".into() }),
        )
        .await
        .unwrap();

    let outcome = engine.route(&AlertContext::new("alert-1", "fyi", 0.2)).await.unwrap();
    assert_eq!(
        outcome,
        RouteOutcome::Notified { alert_id: "alert-1".into(), rule_id: rule.id }
    );
    assert!(engine.get_assignment("alert-1").await.unwrap().is_none());
    assert_eq!(recorder.wait_for(1, Duration::from_secs(2)).await.len(), 1);
}

#[tokio::test]
async fn test_escalate_rule_queues_for_supervisors() {
    let (engine, recorder) = memory_engine().await;
    engine.register_agent(AgentProfile::new("rep", 5)).await.unwrap();
    engine
        .create_rule(
            RuleDraft::new("critical", 100)
                .with_condition(Condition::Equals { field: "priority".into(), value: json!("critical") })
                .with_action(Action::Escalate { reason: Some("critical churn risk".into()) }),
        )
        .await
        .unwrap();

    let alert = AlertContext::new("alert-1", "churn", 0.95).with_priority(AlertPriority::Critical);
    let outcome = engine.route(&alert).await.unwrap();
    assert!(matches!(outcome, RouteOutcome::Escalated { newly_queued: true, .. }));

    let queue = engine.supervisor_queue().await.unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].reason, "critical churn risk");

    let sent = recorder.wait_for(1, Duration::from_secs(2)).await;
    assert_eq!(sent[0].0, "supervisor");

    // Assigning the alert takes it out of the queue
    engine
        .bulk_assign(&["alert-1".to_string()], Some("rep"))
        .await
        .unwrap();
    assert!(engine.supervisor_queue().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_manual_reassignment_is_atomic() {
    let (engine, _) = memory_engine().await;
    engine.register_agent(AgentProfile::new("first", 5)).await.unwrap();
    engine.register_agent(AgentProfile::new("second", 5).manual_only()).await.unwrap();
    engine.register_agent(AgentProfile::new("full", 0).manual_only()).await.unwrap();

    engine.route(&AlertContext::new("alert-1", "upsell", 0.5)).await.unwrap();

    // Target has no capacity: nothing changes
    let failed = engine.reassign("alert-1", "full", "swap").await;
    assert!(matches!(failed, Err(RoutingError::CapacityExceeded { .. })));
    let history = engine.assignment_history("alert-1").await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, AssignmentStatus::Pending);

    let moved = engine.reassign("alert-1", "second", "customer asked").await.unwrap();
    assert_eq!(moved.assigned_agent_id, "second");
    assert_eq!(moved.routing_strategy, RoutingStrategy::ManualReassignment);

    let history = engine.assignment_history("alert-1").await.unwrap();
    let statuses: Vec<AssignmentStatus> = history.iter().map(|a| a.status).collect();
    assert_eq!(statuses, vec![AssignmentStatus::Reassigned, AssignmentStatus::Pending]);

    assert_eq!(engine.get_agent_workload("first").await.unwrap().active_alerts, 0);
    assert_eq!(engine.get_agent_workload("second").await.unwrap().active_alerts, 1);
}

#[tokio::test]
async fn test_reassigning_a_closed_alert_is_a_stale_conflict() {
    let (engine, _) = memory_engine().await;
    engine.register_agent(AgentProfile::new("a1", 5)).await.unwrap();
    engine.register_agent(AgentProfile::new("a2", 5)).await.unwrap();

    engine.route(&AlertContext::new("alert-1", "upsell", 0.5)).await.unwrap();
    engine.complete("alert-1").await.unwrap();

    assert!(matches!(
        engine.reassign("alert-1", "a2", "late").await,
        Err(RoutingError::StaleStateConflict { .. })
    ));
}

#[tokio::test]
async fn test_bulk_assign_reports_each_alert() {
    let (engine, _) = memory_engine().await;
    engine.register_agent(AgentProfile::new("closer", 2).manual_only()).await.unwrap();

    let ids: Vec<String> = (0..3).map(|i| format!("alert-{}", i)).collect();
    let results = engine.bulk_assign(&ids, Some("closer")).await.unwrap();

    assert_eq!(results.len(), 3);
    assert!(results[0].is_success());
    assert!(results[1].is_success());
    assert!(matches!(
        results[2].outcome,
        BulkOutcome::Failed(RoutingError::CapacityExceeded { .. })
    ));

    // No auto-assign agents: the default strategy has nobody to pick
    let untargeted = engine.bulk_assign(&["alert-9".to_string()], None).await.unwrap();
    assert!(matches!(untargeted[0].outcome, BulkOutcome::Unroutable(_)));
}

#[tokio::test]
async fn test_bulk_assign_enforces_batch_limit() {
    let (engine, _) = memory_engine().await;
    let limit = engine.config().routing.max_bulk_size;
    let ids: Vec<String> = (0..=limit).map(|i| format!("alert-{}", i)).collect();

    assert!(matches!(
        engine.bulk_assign(&ids, None).await,
        Err(RoutingError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_acknowledge_then_complete_frees_capacity() {
    let (engine, _) = memory_engine().await;
    engine.register_agent(AgentProfile::new("solo", 1)).await.unwrap();

    engine.route(&AlertContext::new("alert-1", "upsell", 0.5)).await.unwrap();
    assert!(engine.route(&AlertContext::new("alert-2", "upsell", 0.5)).await.unwrap().is_unroutable());

    let acked = engine.acknowledge("alert-1", "solo").await.unwrap();
    assert_eq!(acked.status, AssignmentStatus::Acknowledged);
    engine.complete("alert-1").await.unwrap();

    let retry = engine.route(&AlertContext::new("alert-2", "upsell", 0.5)).await.unwrap();
    assert_eq!(retry.agent_id(), Some("solo"));
}

#[tokio::test]
async fn test_available_agents_and_workload_views() {
    let (engine, _) = memory_engine().await;
    engine
        .register_agent(AgentProfile::new("west-1", 2).with_territory("west").with_skill("luxury"))
        .await
        .unwrap();
    engine.register_agent(AgentProfile::new("east-1", 2).with_territory("east")).await.unwrap();

    let west = engine
        .get_available_agents(Some(AgentFilter::territory("west")))
        .await
        .unwrap();
    assert_eq!(west.len(), 1);
    assert_eq!(west[0].workload.available_capacity, 2);
    assert_eq!(engine.get_available_agents(None).await.unwrap().len(), 2);

    let first = engine.get_agent_workload("east-1").await.unwrap();
    let second = engine.get_agent_workload("east-1").await.unwrap();
    assert_eq!(first, second);

    let patch = AgentProfilePatch { available: Some(false), ..Default::default() };
    engine.update_agent_profile("west-1", patch).await.unwrap();
    assert!(engine
        .get_available_agents(Some(AgentFilter::territory("west")))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_routing_stats_group_by_strategy() {
    let (engine, _) = memory_engine().await;
    engine.register_agent(AgentProfile::new("a1", 10)).await.unwrap();
    engine.register_agent(AgentProfile::new("a2", 10)).await.unwrap();
    engine
        .create_rule(
            RuleDraft::new("vip", 100)
                .with_condition(confidence_above(0.8))
                .with_action(to_agent("a1")),
        )
        .await
        .unwrap();

    engine.route(&AlertContext::new("hot", "upsell", 0.9)).await.unwrap();
    engine.route(&AlertContext::new("warm", "upsell", 0.5)).await.unwrap();
    engine.reassign("hot", "a2", "rebalance").await.unwrap();

    let stats = engine.get_routing_stats(DateRange::last_days(1)).await.unwrap();
    assert_eq!(stats.total_assignments, 3);
    assert_eq!(stats.by_strategy.get("rule"), Some(&1));
    assert_eq!(stats.by_strategy.get("round_robin"), Some(&1));
    assert_eq!(stats.by_strategy.get("manual_reassignment"), Some(&1));
    assert_eq!(stats.reassignments, 1);
    assert!((stats.reassignment_rate - 1.0 / 3.0).abs() < 1e-9);
    assert_eq!(stats.by_status.get("PENDING"), Some(&2));
}

#[tokio::test]
async fn test_rule_admin_round_trip() {
    let (engine, _) = memory_engine().await;
    let rule = engine.create_rule(catch_all("r", 1)).await.unwrap();

    let patch = RulePatch { priority: Some(9), enabled: Some(false), ..Default::default() };
    let updated = engine.update_rule(&rule.id, patch).await.unwrap();
    assert_eq!(updated.priority, 9);
    assert!(!updated.enabled);

    // Disabled rules are still listed for administration
    assert_eq!(engine.list_rules().await.unwrap().len(), 1);

    let bad = RulePatch {
        conditions: Some(vec![Condition::In { field: "territory".into(), values: vec![] }]),
        ..Default::default()
    };
    assert!(matches!(
        engine.update_rule(&rule.id, bad).await,
        Err(RoutingError::Configuration(_))
    ));

    engine.delete_rule(&rule.id).await.unwrap();
    assert!(engine.list_rules().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cancelled_route_leaves_engine_usable() {
    let (engine, _) = memory_engine().await;
    engine.register_agent(AgentProfile::new("rep", 100)).await.unwrap();

    // Abandon routes after a varying number of polls so some are dropped
    // while their write transaction is open
    for polls in 0..12 {
        let alert = AlertContext::new(format!("dropped-{}", polls), "upsell", 0.5);
        let mut pending = Box::pin(engine.route(&alert));
        for _ in 0..polls {
            if futures::poll!(pending.as_mut()).is_ready() {
                break;
            }
            tokio::task::yield_now().await;
        }
        drop(pending);

        let follow_up = AlertContext::new(format!("after-{}", polls), "upsell", 0.5);
        let outcome = engine.route(&follow_up).await.unwrap();
        assert_eq!(outcome.agent_id(), Some("rep"));
    }

    // Workload agrees with the records that actually committed
    let mut open = 0;
    for polls in 0..12 {
        for prefix in ["dropped", "after"] {
            if engine.get_assignment(&format!("{}-{}", prefix, polls)).await.unwrap().is_some() {
                open += 1;
            }
        }
    }
    engine.clear_caches();
    assert_eq!(engine.get_agent_workload("rep").await.unwrap().active_alerts, open);
}
