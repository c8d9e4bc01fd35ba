// Persistent stores for the snapshot pipeline.
// Two tables: the keyed "current" table (latest value per organization) and
// the append-only "historical" table every update cycle writes into.

pub mod current;
pub mod history;

pub use current::{CurrentMetricRecord, CurrentMetricsStore};
pub use history::{HistoricalMetricsStore, HistoricalSnapshot};

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{migrate::MigrateDatabase, SqlitePool};
use thiserror::Error;
use tracing::info;

/// Failure against a backing store. Fatal to the current cycle step for one
/// organization, never to the whole cycle.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Owns the SQLite pool both stores hand out handles to.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if missing) the database at `url` and ensure the schema
    /// exists.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        if !sqlx::Sqlite::database_exists(url).await? {
            info!("Creating database at {}", url);
            sqlx::Sqlite::create_database(url).await?;
        }

        let pool = SqlitePool::connect(url).await?;
        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    /// In-memory database for tests. A single connection keeps every handle
    /// on the same SQLite memory instance.
    pub async fn connect_in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS current_metrics (
                organization_slug TEXT PRIMARY KEY,
                value REAL NOT NULL,
                last_updated TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS historical_metrics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                organization_slug TEXT NOT NULL,
                value REAL NOT NULL,
                captured_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Range queries scan one organization's snapshots in time order
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_historical_org_time
            ON historical_metrics (organization_slug, captured_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn current(&self) -> CurrentMetricsStore {
        CurrentMetricsStore::new(self.pool.clone())
    }

    pub fn history(&self) -> HistoricalMetricsStore {
        HistoricalMetricsStore::new(self.pool.clone())
    }

    /// Close database connections gracefully
    pub async fn close(&self) {
        info!("Shutting down database connections...");
        self.pool.close().await;
        info!("Database connections closed");
    }
}
