//! # Alert Routing Engine
//!
//! Assigns incoming business alerts to human agents using configurable
//! routing rules, agent capacity, territory and skill matching, round-robin
//! fairness and escalation policy.
//!
//! ## Overview
//!
//! - **Rules** ([`rules`]): prioritized conditions over the alert context plus
//!   ordered actions. First match wins; a failing action falls back to its
//!   declared fallback, then to the next rule, then to the default
//!   round-robin strategy.
//! - **Agents** ([`agent`]): profiles with capacity, territories and skills.
//!   Workload is always derived from open assignments, never counted.
//! - **Assignments** ([`assignment`], [`database`]): created only through an
//!   atomic check-and-reserve, so an agent can never exceed its capacity even
//!   under concurrent routing.
//! - **Sweeper** ([`sweeper`]): escalates assignments nobody acknowledged.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use alert_routing::prelude::*;
//!
//! # async fn example() -> alert_routing::Result<()> {
//! let engine = RoutingEngine::new(RoutingEngineConfig::in_memory()).await?;
//! engine.register_agent(AgentProfile::new("ana", 3).with_territory("west")).await?;
//!
//! let alert = AlertContext::new("alert-42", "upsell_opportunity", 0.87).with_territory("west");
//! let outcome = engine.route(&alert).await?;
//! assert!(outcome.is_assigned());
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod assignment;
pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod notify;
pub mod orchestrator;
pub mod routing;
pub mod rules;
pub mod sweeper;

pub use config::RoutingEngineConfig;
pub use error::{Result, RoutingError};
pub use orchestrator::{RouteOutcome, RoutingEngine};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::agent::{AgentFilter, AgentProfile, AgentProfilePatch, AgentSnapshot, AgentWorkload};
    pub use crate::assignment::{AlertAssignment, AssignmentStatus, RoutingStrategy};
    pub use crate::config::RoutingEngineConfig;
    pub use crate::error::{Result, RoutingError};
    pub use crate::notify::{NotificationDispatcher, RecordingNotifier, TracingNotifier};
    pub use crate::orchestrator::{
        BulkAssignResult, BulkOutcome, DateRange, RouteDecision, RouteOutcome, RoutingEngine, RoutingStats,
    };
    pub use crate::routing::{AlertContext, AlertPriority};
    pub use crate::rules::{Action, Condition, RoutingRule, RuleDraft, RulePatch};
    pub use crate::sweeper::{StaleAlertSweeper, SweepReport, SweeperHandle};
}
