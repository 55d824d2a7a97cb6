//! # Database Management (sqlx + SQLite)
//!
//! Authoritative store for agents, routing rules, alert assignments and the
//! supervisor queue. Everything correctness-critical (capacity reservation,
//! status transitions, reassignment) happens here inside write transactions
//! that take the SQLite write lock first, so the check and the write cannot
//! interleave with another writer.
//!
//! ```rust,no_run
//! use alert_routing::config::DatabaseConfig;
//! use alert_routing::database::DatabaseManager;
//!
//! # async fn example() -> alert_routing::Result<()> {
//! let db = DatabaseManager::new(&DatabaseConfig::default()).await?;
//! let agents = db.list_agents().await?;
//! println!("{} agents registered", agents.len());
//! # Ok(())
//! # }
//! ```

pub mod agents;
pub mod assignments;
pub mod rules;
pub mod supervisor;

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::{Result, RoutingError};

pub use assignments::{AssignmentCounts, StatusGuard};
pub use supervisor::SupervisorQueueEntry;

/// Main database manager
#[derive(Clone)]
pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    /// Connect, configure and migrate
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Initializing routing database: {}", config.url);

        let mut options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| RoutingError::configuration(format!("Invalid database url: {}", e)))?
            .busy_timeout(config.busy_timeout())
            .foreign_keys(true)
            .create_if_missing(true);

        if !config.is_in_memory() {
            options = options
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal);
        }

        let mut pool_options = SqlitePoolOptions::new().max_connections(config.pool_size());
        if config.is_in_memory() {
            // The database lives exactly as long as its single connection
            pool_options = pool_options
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options.connect_with(options).await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("Routing database ready (pool size {})", config.pool_size());
        Ok(Self { pool })
    }

    /// Create an in-memory database for testing
    pub async fn new_in_memory() -> Result<Self> {
        Self::new(&DatabaseConfig::default()).await
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Open a write transaction holding the SQLite write lock.
    ///
    /// The no-op UPDATE takes the lock before anything is read, so the
    /// transaction never has to upgrade a read snapshot (which fails under WAL
    /// instead of waiting). Dropping the transaction without `commit` rolls
    /// it back, including when the caller's future is cancelled.
    pub(crate) async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE alert_assignments SET status = status WHERE 0")
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }

    /// Close the pool
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Decode a JSON text column
pub(crate) fn from_json_column<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T> {
    Ok(serde_json::from_str(raw)?)
}

/// Clamp a SQLite integer into `u32`
pub(crate) fn to_u32(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}
