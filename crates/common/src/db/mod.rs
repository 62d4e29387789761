//! Database layer for PeerDesk
//!
//! Provides:
//! - The `JournalStore` persistence interface
//! - In-memory and PostgreSQL (SeaORM) implementations
//! - Connection pool management and schema migrations
//! - Backend selection from configuration

pub mod memory;
pub mod models;
mod repository;
pub mod store;

pub use memory::InMemoryJournalStore;
pub use repository::PgJournalStore;
pub use store::{DeleteOutcome, JournalStore, ReviewInsert, StatusChange, SubmissionUpdate};

use crate::config::{DatabaseConfig, StoreBackend};
use crate::errors::{AppError, Result};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    connection: DatabaseConnection,
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let url = config.url.as_deref().ok_or_else(|| AppError::Configuration {
            message: "database.url is required for the postgres backend".to_string(),
        })?;

        info!("Connecting to database...");

        let mut opts = ConnectOptions::new(url);
        opts.max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .sqlx_logging(false);

        let connection = Database::connect(opts)
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to connect: {}", e),
            })?;

        info!("Database connection established");

        Ok(Self { connection })
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.connection
    }

    /// Apply pending schema migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(self.connection.get_postgres_connection_pool())
            .await?;
        info!("Database migrations applied");
        Ok(())
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        self.connection
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Ping failed: {}", e),
            })?;
        Ok(())
    }
}

/// Create the journal store selected by configuration
pub async fn create_store(config: &DatabaseConfig) -> Result<Arc<dyn JournalStore>> {
    match config.backend {
        StoreBackend::Memory => {
            info!("Using in-memory journal store; state is lost on restart");
            Ok(Arc::new(InMemoryJournalStore::new()))
        }
        StoreBackend::Postgres => {
            let pool = DbPool::new(config).await?;
            if config.run_migrations {
                pool.migrate().await?;
            }
            Ok(Arc::new(PgJournalStore::new(pool)))
        }
    }
}
