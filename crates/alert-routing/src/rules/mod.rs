//! Routing rules: typed conditions and actions, the evaluator, and the store.

pub mod evaluator;
pub mod store;
pub mod types;

pub use evaluator::{evaluate, matches_all, resolve_path};
pub use store::RuleStore;
pub use types::{Action, Condition, RoutingRule, RuleDraft, RulePatch};
