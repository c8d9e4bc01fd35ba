use crate::source::{FetchError, MetricSource};
use crate::store::{CurrentMetricsStore, HistoricalMetricsStore, StoreError};
use crate::telemetry;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Why one organization's step in a cycle failed.
#[derive(Debug, Error)]
pub enum CycleStepError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug)]
pub struct CycleFailure {
    pub organization: String,
    pub error: CycleStepError,
}

/// Outcome of one update cycle, for observability. A failure here is one
/// organization's failure; the cycle itself always runs to completion.
#[derive(Debug)]
pub struct CycleReport {
    /// Correlation id threaded through this cycle's log lines
    pub cycle_id: String,
    /// The single logical timestamp shared by every snapshot in this cycle
    pub cycle_time: DateTime<Utc>,
    pub succeeded: Vec<String>,
    pub failed: Vec<CycleFailure>,
}

impl CycleReport {
    pub fn success_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }

    /// One-line summary for CLI output and iteration logs.
    pub fn summary(&self) -> String {
        if self.failed.is_empty() {
            format!("{} organizations updated", self.success_count())
        } else {
            let failed_orgs: Vec<&str> = self
                .failed
                .iter()
                .map(|f| f.organization.as_str())
                .collect();
            format!(
                "{} organizations updated, {} failed ({})",
                self.success_count(),
                self.failure_count(),
                failed_orgs.join(", ")
            )
        }
    }
}

/// Orchestrates one update cycle: fetch per tracked organization, upsert the
/// current table, append to history. All writes in a cycle share one logical
/// timestamp. One bad organization never aborts the cycle.
pub struct SnapshotUpdater {
    source: Arc<dyn MetricSource>,
    current: CurrentMetricsStore,
    history: HistoricalMetricsStore,
}

impl SnapshotUpdater {
    pub fn new(
        source: Arc<dyn MetricSource>,
        current: CurrentMetricsStore,
        history: HistoricalMetricsStore,
    ) -> Self {
        Self {
            source,
            current,
            history,
        }
    }

    /// Run one cycle stamped with the current wall-clock time.
    pub async fn run_cycle(&self, tracked_orgs: &[String]) -> CycleReport {
        self.run_cycle_at(Utc::now(), tracked_orgs).await
    }

    /// Run one cycle with an explicit logical timestamp. Exposed so callers
    /// (and tests) can pin the cycle time instead of taking wall clock.
    pub async fn run_cycle_at(
        &self,
        cycle_time: DateTime<Utc>,
        tracked_orgs: &[String],
    ) -> CycleReport {
        let cycle_id = telemetry::new_cycle_id();
        info!(
            cycle.id = %cycle_id,
            cycle.time = %cycle_time,
            tracked = tracked_orgs.len(),
            "starting update cycle"
        );

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();

        for org in tracked_orgs {
            match self.source.fetch(org).await {
                Ok(value) => match self.commit_org(org, value, cycle_time).await {
                    Ok(()) => {
                        info!(cycle.id = %cycle_id, org, value, "organization updated");
                        succeeded.push(org.clone());
                    }
                    Err(e) => {
                        warn!(cycle.id = %cycle_id, org, error = %e, "store write failed");
                        failed.push(CycleFailure {
                            organization: org.clone(),
                            error: e.into(),
                        });
                    }
                },
                Err(e) => {
                    // A failed fetch is a no-op for this organization in this
                    // cycle: no historical row, current record untouched
                    warn!(cycle.id = %cycle_id, org, error = %e, "fetch failed");
                    failed.push(CycleFailure {
                        organization: org.clone(),
                        error: e.into(),
                    });
                }
            }
        }

        let report = CycleReport {
            cycle_id,
            cycle_time,
            succeeded,
            failed,
        };
        info!(
            cycle.id = %report.cycle_id,
            succeeded = report.success_count(),
            failed = report.failure_count(),
            "update cycle finished"
        );
        report
    }

    /// Paired write for one organization: latest value, then history row,
    /// both stamped with the cycle timestamp.
    async fn commit_org(
        &self,
        org: &str,
        value: f64,
        cycle_time: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.current.upsert(org, value, cycle_time).await?;
        self.history.append(org, value, cycle_time).await?;
        Ok(())
    }
}
