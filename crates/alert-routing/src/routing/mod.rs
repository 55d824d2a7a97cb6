//! Alert context, round-robin selection and action execution.

pub mod actions;
pub mod context;
pub mod round_robin;

pub use actions::{ActionExecutor, ActionOutcome, ActionScope, Placement, StaleOutcome};
pub use context::{AlertContext, AlertPriority};
pub use round_robin::{PoolKey, RoundRobinSelector};
