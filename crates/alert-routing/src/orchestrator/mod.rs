//! # Routing Orchestration
//!
//! [`RoutingEngine`] ties the rule store, the agent directory and the action
//! executor together and exposes the engine's operations:
//!
//! - **[`routing`]**: `route`, rule-driven placement of one alert
//! - **[`assignments`]**: `reassign`, `bulk_assign`, acknowledge/complete, history
//! - **[`agents`]**: agent profiles, availability and workload
//! - **[`rules`]**: rule CRUD
//! - **[`stats`]**: routing statistics
//!
//! Stale alert handling lives in [`crate::sweeper`] and re-enters the engine.
//!
//! ## Example
//!
//! ```rust,no_run
//! use alert_routing::prelude::*;
//!
//! # async fn example() -> alert_routing::Result<()> {
//! let engine = RoutingEngine::new(RoutingEngineConfig::in_memory()).await?;
//! engine.register_agent(AgentProfile::new("ana", 5).with_skill("luxury")).await?;
//! engine
//!     .create_rule(
//!         RuleDraft::new("luxury leads", 100)
//!             .with_condition(Condition::GreaterThan {
//!                 field: "confidence".into(),
//!                 value: serde_json::json!(0.8),
//!             })
//!             .with_action(Action::AssignBySkill { skills: vec!["luxury".into()], fallback: None }),
//!     )
//!     .await?;
//!
//! match engine.route(&AlertContext::new("alert-1", "upsell", 0.93)).await? {
//!     RouteOutcome::Assigned(decision) => println!("assigned to {}", decision.agent_id),
//!     other => println!("not assigned: {:?}", other),
//! }
//! # Ok(())
//! # }
//! ```

pub mod agents;
pub mod assignments;
pub mod core;
pub mod routing;
pub mod rules;
pub mod stats;
pub mod types;

pub use self::core::RoutingEngine;
pub use stats::{DateRange, RoutingStats};
pub use types::{BulkAssignResult, BulkOutcome, RouteDecision, RouteOutcome};
