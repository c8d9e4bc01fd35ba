// Metric sources: where "merges per day" numbers come from.
// The pipeline only sees the MetricSource trait; rate limits, pagination and
// auth are the implementation's concern.

pub mod errors;
pub mod github;

pub use errors::FetchError;
pub use github::GitHubMetricSource;

use async_trait::async_trait;

/// Opaque fetch operation returning the current metric value for one
/// organization. Any failure means "this organization's cycle step failed";
/// the updater treats all variants uniformly.
#[async_trait]
pub trait MetricSource: Send + Sync {
    async fn fetch(&self, org: &str) -> Result<f64, FetchError>;
}
