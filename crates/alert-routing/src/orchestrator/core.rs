use std::sync::Arc;

use tracing::info;

use crate::agent::AgentDirectory;
use crate::cache::RoutingCaches;
use crate::config::RoutingEngineConfig;
use crate::database::DatabaseManager;
use crate::error::Result;
use crate::notify::{NotificationDispatcher, Notifier, TracingNotifier};
use crate::routing::{ActionExecutor, RoundRobinSelector};
use crate::rules::RuleStore;

/// Alert routing engine
///
/// Cheap to clone; every clone shares the same database pool, caches and
/// round-robin pointers.
#[derive(Clone)]
pub struct RoutingEngine {
    pub(crate) config: Arc<RoutingEngineConfig>,
    pub(crate) db: DatabaseManager,
    pub(crate) caches: Arc<RoutingCaches>,
    pub(crate) rules: RuleStore,
    pub(crate) directory: AgentDirectory,
    pub(crate) executor: ActionExecutor,
}

impl RoutingEngine {
    /// Create an engine that logs notifications instead of delivering them
    pub async fn new(config: RoutingEngineConfig) -> Result<Self> {
        Self::with_notifier(config, Arc::new(TracingNotifier)).await
    }

    /// Create an engine with a custom notification dispatcher
    pub async fn with_notifier(
        config: RoutingEngineConfig,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) -> Result<Self> {
        config.validate()?;
        let db = DatabaseManager::new(&config.database).await?;
        Ok(Self::from_parts(config, db, dispatcher))
    }

    /// Build on an already initialised database
    pub fn from_parts(
        config: RoutingEngineConfig,
        db: DatabaseManager,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        let caches = Arc::new(RoutingCaches::new(&config.cache));
        let rules = RuleStore::new(db.clone(), caches.clone(), config.routing.max_fallback_depth);
        let directory = AgentDirectory::new(db.clone(), caches.clone());
        let notifier = Notifier::new(dispatcher, config.notifications.dispatch_timeout());
        let executor = ActionExecutor::new(
            db.clone(),
            directory.clone(),
            Arc::new(RoundRobinSelector::new()),
            notifier,
            config.routing.escalation_skill.clone(),
            config.notifications.escalation_channel.clone(),
        );

        info!(
            escalation_skill = %config.routing.escalation_skill,
            "Alert routing engine ready"
        );

        Self {
            config: Arc::new(config),
            db,
            caches,
            rules,
            directory,
            executor,
        }
    }

    pub fn config(&self) -> &RoutingEngineConfig {
        &self.config
    }

    /// Direct access to the authoritative store
    pub fn database(&self) -> &DatabaseManager {
        &self.db
    }

    pub fn directory(&self) -> &AgentDirectory {
        &self.directory
    }

    pub fn rule_store(&self) -> &RuleStore {
        &self.rules
    }

    pub fn selector(&self) -> &RoundRobinSelector {
        self.executor.selector()
    }

    /// Drop every cached rule snapshot and workload
    pub fn clear_caches(&self) {
        self.caches.clear();
    }
}
