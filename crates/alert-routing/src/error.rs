use thiserror::Error;

/// Alert routing engine errors
///
/// `Unroutable` is deliberately absent: exhausting every strategy is a normal
/// outcome reported through [`crate::orchestrator::RouteOutcome`].
#[derive(Error, Debug)]
pub enum RoutingError {
    /// Malformed rule, condition, action or engine configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The agent has no free capacity (or lost a reservation race)
    #[error("Capacity exceeded for agent {agent_id}")]
    CapacityExceeded { agent_id: String },

    /// The agent exists but is marked unavailable
    #[error("Agent {agent_id} is unavailable")]
    AgentUnavailable { agent_id: String },

    /// An optimistic, status-guarded transition lost a race
    #[error("Stale state for alert {alert_id}: expected {expected}")]
    StaleStateConflict { alert_id: String, expected: String },

    /// The alert already has a non-terminal assignment
    #[error("Alert {alert_id} already has an open assignment")]
    AlreadyAssigned { alert_id: String },

    /// Notification dispatch failed (never fatal to routing)
    #[error("Notification delivery failed: {0}")]
    NotificationDelivery(String),

    /// Not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration errors
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// JSON (de)serialization of stored conditions/actions
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RoutingError {
    /// Create a new Configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a new CapacityExceeded error
    pub fn capacity_exceeded<S: Into<String>>(agent_id: S) -> Self {
        Self::CapacityExceeded { agent_id: agent_id.into() }
    }

    /// Create a new StaleStateConflict error
    pub fn stale_state<A: Into<String>, E: Into<String>>(alert_id: A, expected: E) -> Self {
        Self::StaleStateConflict {
            alert_id: alert_id.into(),
            expected: expected.into(),
        }
    }

    /// Create a new NotFound error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new InvalidInput error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new Internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Transient failures feed the fallback chain instead of surfacing to callers.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::CapacityExceeded { .. }
                | Self::AgentUnavailable { .. }
                | Self::StaleStateConflict { .. }
        )
    }

    /// Storage-level unique constraint violation (open assignment already exists).
    pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
        match err {
            sqlx::Error::Database(db) => db.is_unique_violation(),
            _ => false,
        }
    }
}

/// Result type for alert routing operations
pub type Result<T> = std::result::Result<T, RoutingError>;
