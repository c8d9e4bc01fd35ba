// Graph composition: active-org filter + history + trend analysis feeding the
// renderer. This module builds data series; it never draws pixels.

pub mod pipeline;
pub mod render;

pub use pipeline::{GraphPipeline, PipelineError, RenderReport};
pub use render::{ChartDataRenderer, RenderError, Renderer};

use crate::trend::SeriesPoint;

/// One labeled series handed to the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSeries {
    pub label: String,
    pub points: Vec<SeriesPoint>,
}

impl MetricSeries {
    pub fn new(label: impl Into<String>, points: Vec<SeriesPoint>) -> Self {
        Self {
            label: label.into(),
            points,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
