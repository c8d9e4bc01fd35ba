use super::StoreError;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;

/// Latest known metric value for one organization. Its existence is the sole
/// definition of "active organization".
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentMetricRecord {
    pub organization_slug: String,
    pub value: f64,
    pub last_updated: DateTime<Utc>,
}

/// Keyed table holding the latest metric value per organization.
/// One record per slug, overwritten on each update cycle.
#[derive(Debug, Clone)]
pub struct CurrentMetricsStore {
    pool: SqlitePool,
}

impl CurrentMetricsStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert-if-absent, update-if-present. Last write wins.
    pub async fn upsert(
        &self,
        org: &str,
        value: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO current_metrics (organization_slug, value, last_updated)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(org)
        .bind(value)
        .bind(timestamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Every organization with a current record.
    pub async fn list_active_orgs(&self) -> Result<HashSet<String>, StoreError> {
        let rows = sqlx::query("SELECT organization_slug FROM current_metrics")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| row.get::<String, _>("organization_slug"))
            .collect())
    }

    pub async fn get(&self, org: &str) -> Result<Option<CurrentMetricRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT organization_slug, value, last_updated
            FROM current_metrics
            WHERE organization_slug = ?1
            "#,
        )
        .bind(org)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| CurrentMetricRecord {
            organization_slug: row.get("organization_slug"),
            value: row.get("value"),
            last_updated: row.get("last_updated"),
        }))
    }

    /// Full-scan read, ordered by slug for stable display.
    pub async fn all_records(&self) -> Result<Vec<CurrentMetricRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT organization_slug, value, last_updated
            FROM current_metrics
            ORDER BY organization_slug ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| CurrentMetricRecord {
                organization_slug: row.get("organization_slug"),
                value: row.get("value"),
                last_updated: row.get("last_updated"),
            })
            .collect())
    }

    /// Deactivate an organization. Its historical snapshots are retained for
    /// potential re-activation; it simply stops appearing in filtered views.
    /// Returns whether a record existed.
    pub async fn remove(&self, org: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM current_metrics WHERE organization_slug = ?1")
            .bind(org)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
