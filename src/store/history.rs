use super::StoreError;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;

/// One immutable (organization, value, time) snapshot row.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalSnapshot {
    pub organization_slug: String,
    pub value: f64,
    pub captured_at: DateTime<Utc>,
}

/// Append-only log of metric snapshots. Rows are never mutated or deleted by
/// the pipeline; the store does not deduplicate by timestamp — running at
/// most one cycle per logical timestamp is the scheduler's job.
#[derive(Debug, Clone)]
pub struct HistoricalMetricsStore {
    pool: SqlitePool,
}

impl HistoricalMetricsStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append one snapshot row. Fails only on storage-layer errors.
    pub async fn append(
        &self,
        org: &str,
        value: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO historical_metrics (organization_slug, value, captured_at)
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

    /// Snapshots for the given organizations within `[since, until]`, ordered
    /// by captured_at ascending (slug breaks ties for determinism).
    pub async fn query(
        &self,
        orgs: &HashSet<String>,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<HistoricalSnapshot>, StoreError> {
        if orgs.is_empty() {
            return Ok(Vec::new());
        }

        // sqlx has no array binding for SQLite; build the IN list by hand
        let placeholders = vec!["?"; orgs.len()].join(", ");
        let sql = format!(
            r#"
            SELECT organization_slug, value, captured_at
            FROM historical_metrics
            WHERE organization_slug IN ({placeholders})
              AND captured_at >= ? AND captured_at <= ?
            ORDER BY captured_at ASC, organization_slug ASC
            "#
        );

        let mut sorted_orgs: Vec<&String> = orgs.iter().collect();
        sorted_orgs.sort();

        let mut query = sqlx::query(&sql);
        for org in sorted_orgs {
            query = query.bind(org);
        }
        query = query.bind(since).bind(until);

        let rows = query.fetch_all(&self.pool).await?;

        Ok(rows
            .into_iter()
            .map(|row| HistoricalSnapshot {
                organization_slug: row.get("organization_slug"),
                value: row.get("value"),
                captured_at: row.get("captured_at"),
            })
            .collect())
    }

    /// Range query for a single organization, timestamp ascending.
    pub async fn query_org(
        &self,
        org: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<HistoricalSnapshot>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT organization_slug, value, captured_at
            FROM historical_metrics
            WHERE organization_slug = ?1
              AND captured_at >= ?2 AND captured_at <= ?3
            ORDER BY captured_at ASC
            "#,
        )
        .bind(org)
        .bind(since)
        .bind(until)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| HistoricalSnapshot {
                organization_slug: row.get("organization_slug"),
                value: row.get("value"),
                captured_at: row.get("captured_at"),
            })
            .collect())
    }

    /// Total snapshot rows, for status display.
    pub async fn snapshot_count(&self) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM historical_metrics")
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get::<i64, _>("count") as u64)
    }
}
