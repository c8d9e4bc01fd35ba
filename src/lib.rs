// merge-radar - GitHub organization merge-activity sampling and trends
// This exposes the core components for testing and integration

pub mod config;
pub mod filter;
pub mod graph;
pub mod scheduler;
pub mod source;
pub mod store;
pub mod telemetry;
pub mod trend;
pub mod updater;

// Re-export key types for easy access
pub use config::{config, init_config, MergeRadarConfig};
pub use filter::ActiveOrgFilter;
pub use graph::{ChartDataRenderer, GraphPipeline, MetricSeries, PipelineError, RenderError, Renderer};
pub use scheduler::{RunMode, SchedulerState, StopHandle, UpdateScheduler};
pub use source::{FetchError, GitHubMetricSource, MetricSource};
pub use store::{
    CurrentMetricRecord, CurrentMetricsStore, Database, HistoricalMetricsStore,
    HistoricalSnapshot, StoreError,
};
pub use telemetry::{init_telemetry, new_cycle_id, shutdown_telemetry};
pub use trend::{average_per_timestamp, SeriesPoint, TrendAnalyzer, TrendDirection, TrendResult};
pub use updater::{CycleFailure, CycleReport, CycleStepError, SnapshotUpdater};
