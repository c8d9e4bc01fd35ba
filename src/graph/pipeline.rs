use super::render::{RenderError, Renderer};
use super::MetricSeries;
use crate::filter::ActiveOrgFilter;
use crate::store::{HistoricalMetricsStore, StoreError};
use crate::trend::{average_per_timestamp, SeriesPoint, TrendAnalyzer, TrendResult};
use chrono::{DateTime, Duration, Utc};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub const AGGREGATE_LABEL: &str = "all-organizations";

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Requested organization is not in the active set. A result, never a
    /// crash; its history may still exist on disk.
    #[error("organization '{0}' is not currently active")]
    NotActive(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Outcome of one full render pass.
#[derive(Debug, Default)]
pub struct RenderReport {
    pub rendered: usize,
    pub failed: usize,
    pub artifacts: Vec<PathBuf>,
}

/// Composes the active-org filter, the historical store and the trend
/// analyzer into the series the external renderer consumes.
pub struct GraphPipeline {
    filter: ActiveOrgFilter,
    history: HistoricalMetricsStore,
    analyzer: TrendAnalyzer,
}

impl GraphPipeline {
    pub fn new(
        filter: ActiveOrgFilter,
        history: HistoricalMetricsStore,
        analyzer: TrendAnalyzer,
    ) -> Self {
        Self {
            filter,
            history,
            analyzer,
        }
    }

    fn window(window_days: u32) -> (DateTime<Utc>, DateTime<Utc>) {
        let until = Utc::now();
        (until - Duration::days(window_days as i64), until)
    }

    /// Per-cycle average of all active organizations' values over the window.
    /// Organizations dropped from current tracking contribute nothing, even
    /// though their snapshots remain stored.
    pub async fn aggregate_series(&self, window_days: u32) -> Result<MetricSeries, PipelineError> {
        let active = self.filter.active_set().await?;
        let (since, until) = Self::window(window_days);

        let snapshots = self.history.query(&active, since, until).await?;
        let points: Vec<SeriesPoint> = snapshots
            .iter()
            .map(|snapshot| (snapshot.captured_at, snapshot.value))
            .collect();

        Ok(MetricSeries::new(
            AGGREGATE_LABEL,
            average_per_timestamp(&points),
        ))
    }

    /// One organization's windowed series, provided it is currently active.
    pub async fn organization_series(
        &self,
        org: &str,
        window_days: u32,
    ) -> Result<MetricSeries, PipelineError> {
        if !self.filter.is_active(org).await? {
            return Err(PipelineError::NotActive(org.to_string()));
        }

        let (since, until) = Self::window(window_days);
        let snapshots = self.history.query_org(org, since, until).await?;
        let points: Vec<SeriesPoint> = snapshots
            .iter()
            .map(|snapshot| (snapshot.captured_at, snapshot.value))
            .collect();

        Ok(MetricSeries::new(org, points))
    }

    /// Trend summary for an already-built series over the same window.
    pub fn trend_for(&self, series: &MetricSeries, window_days: u32) -> TrendResult {
        self.analyzer.compute(&series.points, window_days, Utc::now())
    }

    /// Full render pass: the aggregate view plus one artifact per active
    /// organization. Per-organization render failures are counted and
    /// skipped; they never abort the pass.
    pub async fn render_all(
        &self,
        renderer: &dyn Renderer,
        window_days: u32,
        output_dir: &Path,
    ) -> Result<RenderReport, PipelineError> {
        let mut report = RenderReport::default();

        let aggregate = self.aggregate_series(window_days).await?;
        let aggregate_path = output_dir.join("overall_trend.json");
        match renderer
            .render(&aggregate, "Overall merge activity", &aggregate_path)
            .await
        {
            Ok(()) => {
                report.rendered += 1;
                report.artifacts.push(aggregate_path);
            }
            Err(e) => {
                warn!(error = %e, "aggregate render failed");
                report.failed += 1;
            }
        }

        let mut active: Vec<String> = self.filter.active_set().await?.into_iter().collect();
        active.sort();

        for org in &active {
            let series = match self.organization_series(org, window_days).await {
                Ok(series) => series,
                Err(e) => {
                    // The active set can shift under a concurrent cycle
                    warn!(org, error = %e, "skipping organization series");
                    report.failed += 1;
                    continue;
                }
            };

            let path = output_dir.join("organizations").join(format!("{org}.json"));
            let title = format!("Merge activity - {org}");
            match renderer.render(&series, &title, &path).await {
                Ok(()) => {
                    report.rendered += 1;
                    report.artifacts.push(path);
                }
                Err(e) => {
                    warn!(org, error = %e, "render failed");
                    report.failed += 1;
                }
            }
        }

        info!(
            rendered = report.rendered,
            failed = report.failed,
            "render pass finished"
        );
        Ok(report)
    }
}
