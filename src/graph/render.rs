use super::MetricSeries;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Visualization backend failure. Reported, never fatal: stored data is
/// unaffected and the scheduler keeps running.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("refusing to render empty series '{0}'")]
    EmptySeries(String),

    #[error("failed to serialize chart data: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write chart artifact: {0}")]
    Io(#[from] std::io::Error),
}

/// Opaque rendering backend: one labeled series in, one artifact at a path
/// out.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(
        &self,
        series: &MetricSeries,
        title: &str,
        output_path: &Path,
    ) -> Result<(), RenderError>;
}

#[derive(Serialize)]
struct ChartDocument<'a> {
    title: &'a str,
    label: &'a str,
    generated_at: DateTime<Utc>,
    points: Vec<ChartPoint>,
    stats: ChartStats,
}

#[derive(Serialize)]
struct ChartPoint {
    timestamp: DateTime<Utc>,
    value: f64,
}

#[derive(Serialize)]
struct ChartStats {
    mean: f64,
    max: f64,
    min: f64,
    sample_count: usize,
}

/// Renderer writing chart-ready JSON documents for the dashboard frontend.
/// Swapping in an image backend means implementing [`Renderer`] elsewhere.
#[derive(Debug, Default, Clone)]
pub struct ChartDataRenderer;

impl ChartDataRenderer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Renderer for ChartDataRenderer {
    async fn render(
        &self,
        series: &MetricSeries,
        title: &str,
        output_path: &Path,
    ) -> Result<(), RenderError> {
        if series.points.is_empty() {
            return Err(RenderError::EmptySeries(series.label.clone()));
        }

        let values: Vec<f64> = series.points.iter().map(|(_, value)| *value).collect();
        let stats = ChartStats {
            mean: values.iter().sum::<f64>() / values.len() as f64,
            max: values.iter().copied().fold(f64::MIN, f64::max),
            min: values.iter().copied().fold(f64::MAX, f64::min),
            sample_count: values.len(),
        };

        let document = ChartDocument {
            title,
            label: &series.label,
            generated_at: Utc::now(),
            points: series
                .points
                .iter()
                .map(|(timestamp, value)| ChartPoint {
                    timestamp: *timestamp,
                    value: *value,
                })
                .collect(),
            stats,
        };

        let content = serde_json::to_vec_pretty(&document)?;

        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(output_path, content).await?;

        debug!(path = %output_path.display(), label = %series.label, "chart artifact written");
        Ok(())
    }
}
