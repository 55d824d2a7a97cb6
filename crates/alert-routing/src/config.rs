use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RoutingError};

/// Alert routing engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingEngineConfig {
    /// Persistence settings
    pub database: DatabaseConfig,

    /// Rule and workload cache settings
    pub cache: CacheConfig,

    /// Routing behaviour
    pub routing: RoutingConfig,

    /// Stale alert sweeper
    pub sweeper: SweeperConfig,

    /// Notification side effects
    pub notifications: NotificationConfig,

    /// Logging
    pub logging: LoggingSettings,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection URL (`sqlite::memory:` for an ephemeral store)
    pub url: String,

    /// Maximum pooled connections (in-memory stores always use one)
    pub max_connections: u32,

    /// How long a writer waits for the SQLite write lock
    pub busy_timeout_ms: u64,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Rule snapshot TTL (milliseconds)
    pub rules_ttl_ms: u64,

    /// Workload snapshot TTL (milliseconds)
    pub workload_ttl_ms: u64,

    /// Maximum cached workload snapshots
    pub max_workload_entries: u64,
}

/// Routing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Skill that marks escalation targets
    pub escalation_skill: String,

    /// Maximum nesting of action fallbacks accepted at write time
    pub max_fallback_depth: usize,

    /// Maximum alerts per bulk assignment call
    pub max_bulk_size: usize,
}

/// Stale alert sweeper configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweeperConfig {
    /// Started by `RoutingEngine::start_background_tasks`
    pub enabled: bool,

    /// Seconds between sweeps
    pub interval_secs: u64,

    /// PENDING assignments older than this are escalated
    pub max_age_days: u32,
}

/// Notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Channel used for escalation notices
    pub escalation_channel: String,

    /// Upper bound on a single dispatch (milliseconds)
    pub dispatch_timeout_ms: u64,
}

/// Logging configuration as read from config files
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level (`trace`, `debug`, `info`, `warn`, `error`)
    pub level: String,

    /// Emit JSON lines instead of human readable output
    pub json: bool,

    /// Include file and line information
    pub file_info: bool,
}

impl RoutingEngineConfig {
    /// Load configuration from an optional file layered under
    /// `ALERT_ROUTING__<SECTION>__<KEY>` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("ALERT_ROUTING")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| RoutingError::configuration(format!("Failed to load config: {}", e)))?;

        let config: Self = settings
            .try_deserialize()
            .map_err(|e| RoutingError::configuration(format!("Invalid config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Configuration backed by an in-memory database, used by tests and demos
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<()> {
        if self.database.url.is_empty() {
            return Err(RoutingError::configuration("database.url cannot be empty"));
        }

        if self.database.max_connections == 0 {
            return Err(RoutingError::configuration(
                "database.max_connections must be greater than 0",
            ));
        }

        if self.cache.rules_ttl_ms == 0 || self.cache.workload_ttl_ms == 0 {
            return Err(RoutingError::configuration("cache TTLs must be greater than 0"));
        }

        if self.routing.escalation_skill.trim().is_empty() {
            return Err(RoutingError::configuration(
                "routing.escalation_skill cannot be empty",
            ));
        }

        if self.routing.max_bulk_size == 0 {
            return Err(RoutingError::configuration(
                "routing.max_bulk_size must be greater than 0",
            ));
        }

        if self.sweeper.interval_secs == 0 {
            return Err(RoutingError::configuration(
                "sweeper.interval_secs must be greater than 0",
            ));
        }

        if self.sweeper.max_age_days == 0 {
            return Err(RoutingError::configuration(
                "sweeper.max_age_days must be greater than 0",
            ));
        }

        if self.notifications.escalation_channel.is_empty() {
            return Err(RoutingError::configuration(
                "notifications.escalation_channel cannot be empty",
            ));
        }

        Ok(())
    }
}

impl DatabaseConfig {
    /// In-memory SQLite gives every connection its own database
    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }

    /// Effective pool size
    pub fn pool_size(&self) -> u32 {
        if self.is_in_memory() {
            1
        } else {
            self.max_connections
        }
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl CacheConfig {
    pub fn rules_ttl(&self) -> Duration {
        Duration::from_millis(self.rules_ttl_ms)
    }

    pub fn workload_ttl(&self) -> Duration {
        Duration::from_millis(self.workload_ttl_ms)
    }
}

impl SweeperConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl NotificationConfig {
    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 5,
            busy_timeout_ms: 5000,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            rules_ttl_ms: 5000,      // 5 seconds
            workload_ttl_ms: 2000,   // 2 seconds
            max_workload_entries: 10_000,
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            escalation_skill: "supervisor".to_string(),
            max_fallback_depth: 3,
            max_bulk_size: 500,
        }
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 3600, // 1 hour
            max_age_days: 3,
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            escalation_channel: "supervisor".to_string(),
            dispatch_timeout_ms: 5000,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file_info: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = RoutingEngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sweeper.max_age_days, 3);
        assert_eq!(config.routing.escalation_skill, "supervisor");
    }

    #[test]
    fn test_in_memory_pool_is_single_connection() {
        let config = DatabaseConfig::default();
        assert!(config.is_in_memory());
        assert_eq!(config.pool_size(), 1);

        let file = DatabaseConfig {
            url: "sqlite://routing.db?mode=rwc".to_string(),
            ..Default::default()
        };
        assert!(!file.is_in_memory());
        assert_eq!(file.pool_size(), 5);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = RoutingEngineConfig::default();
        config.routing.escalation_skill = "  ".to_string();
        assert!(matches!(config.validate(), Err(RoutingError::Configuration(_))));

        let mut config = RoutingEngineConfig::default();
        config.sweeper.max_age_days = 0;
        assert!(config.validate().is_err());

        let mut config = RoutingEngineConfig::default();
        config.cache.rules_ttl_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[sweeper]\nmax_age_days = 7\n\n[routing]\nescalation_skill = \"lead\"").unwrap();

        let config = RoutingEngineConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.sweeper.max_age_days, 7);
        assert_eq!(config.routing.escalation_skill, "lead");
        // Untouched sections keep their defaults
        assert_eq!(config.cache.workload_ttl_ms, 2000);
    }
}
