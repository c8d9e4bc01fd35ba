use super::errors::FetchError;
use super::MetricSource;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use governor::{DefaultDirectRateLimiter, Jitter, Quota, RateLimiter};
use octocrab::Octocrab;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const PULLS_PER_PAGE: u8 = 100;
const MAX_PULL_PAGES: u32 = 10;

/// Rate-limited GitHub source computing merges per day for an organization.
///
/// The value is the count of pull requests merged within the lookback window
/// across the organization's most recently pushed repositories, divided by
/// the window length in days.
pub struct GitHubMetricSource {
    octocrab: Octocrab,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
    lookback_days: u32,
    max_repos: u32,
    fetch_timeout: Duration,
}

impl GitHubMetricSource {
    pub fn new(
        token: Option<String>,
        lookback_days: u32,
        max_repos: u32,
        fetch_timeout: Duration,
        requests_per_second: u32,
        burst_capacity: u32,
    ) -> Result<Self, FetchError> {
        // GitHub allows 5000 requests/hour for authenticated users; stay well
        // under it and absorb bursts at cycle start
        let quota = Quota::per_second(
            NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN),
        )
        .allow_burst(NonZeroU32::new(burst_capacity).unwrap_or(NonZeroU32::MIN));
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        let octocrab = match token {
            Some(token) => Octocrab::builder().personal_token(token).build()?,
            None => Octocrab::builder().build()?,
        };

        Ok(Self {
            octocrab,
            rate_limiter,
            lookback_days: lookback_days.max(1),
            max_repos,
            fetch_timeout,
        })
    }

    pub fn from_config(config: &crate::config::GitHubConfig) -> Result<Self, FetchError> {
        Self::new(
            config.token.clone(),
            config.lookback_days,
            config.max_repos_per_org,
            Duration::from_secs(config.fetch_timeout_seconds),
            config.rate_limit.requests_per_second,
            config.rate_limit.burst_capacity,
        )
    }

    async fn throttle(&self) {
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(100)))
            .await;
    }

    async fn merges_per_day(&self, org: &str) -> Result<f64, FetchError> {
        let cutoff = Utc::now() - ChronoDuration::days(self.lookback_days as i64);

        self.throttle().await;
        let repos = self
            .octocrab
            .orgs(org)
            .list_repos()
            .sort(octocrab::params::repos::Sort::Pushed)
            .direction(octocrab::params::Direction::Descending)
            .per_page(self.max_repos.min(100) as u8)
            .send()
            .await
            .map_err(|e| FetchError::from_api(org, e))?;

        let repos: Vec<_> = repos
            .items
            .into_iter()
            .take(self.max_repos as usize)
            .collect();

        if repos.is_empty() {
            warn!(org, "no repositories visible; reporting zero merges");
            return Ok(0.0);
        }

        let mut merged_count: u64 = 0;
        for repo in &repos {
            match self.count_recent_merges(org, &repo.name, cutoff).await {
                Ok(count) => {
                    debug!(org, repo = %repo.name, count, "counted merged pull requests");
                    merged_count += count;
                }
                Err(e) => {
                    // One unreadable repo should not sink the whole org
                    warn!(org, repo = %repo.name, error = %e, "skipping repository");
                }
            }
        }

        Ok(merged_count as f64 / self.lookback_days as f64)
    }

    async fn count_recent_merges(
        &self,
        org: &str,
        repo: &str,
        cutoff: chrono::DateTime<Utc>,
    ) -> Result<u64, FetchError> {
        let mut merged: u64 = 0;

        for page in 1..=MAX_PULL_PAGES {
            self.throttle().await;
            let pulls = self
                .octocrab
                .pulls(org, repo)
                .list()
                .state(octocrab::params::State::Closed)
                .sort(octocrab::params::pulls::Sort::Updated)
                .direction(octocrab::params::Direction::Descending)
                .per_page(PULLS_PER_PAGE)
                .page(page)
                .send()
                .await
                .map_err(|e| FetchError::from_api(org, e))?;

            let fetched = pulls.items.len();
            // Sorted by updated descending: once a whole page predates the
            // cutoff there is nothing newer left
            let mut page_all_stale = fetched > 0;

            for pr in pulls.items {
                if let Some(updated_at) = pr.updated_at {
                    if updated_at >= cutoff {
                        page_all_stale = false;
                    }
                }
                if let Some(merged_at) = pr.merged_at {
                    if merged_at >= cutoff {
                        merged += 1;
                    }
                }
            }

            if fetched < PULLS_PER_PAGE as usize || page_all_stale {
                break;
            }
        }

        Ok(merged)
    }
}

#[async_trait]
impl MetricSource for GitHubMetricSource {
    async fn fetch(&self, org: &str) -> Result<f64, FetchError> {
        match tokio::time::timeout(self.fetch_timeout, self.merges_per_day(org)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                org: org.to_string(),
                seconds: self.fetch_timeout.as_secs(),
            }),
        }
    }
}
