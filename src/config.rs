use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for merge-radar
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MergeRadarConfig {
    /// GitHub fetch settings
    pub github: GitHubConfig,
    /// Storage settings
    pub database: DatabaseConfig,
    /// Update scheduling settings
    pub scheduler: SchedulerConfig,
    /// Graph output settings
    pub graphs: GraphConfig,
    /// Organization slugs sampled on each update cycle
    pub tracked_orgs: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// GitHub API token (can be set via env var)
    pub token: Option<String>,
    /// Days of merge history considered when computing merges per day
    pub lookback_days: u32,
    /// Most-recently-pushed repositories inspected per organization
    pub max_repos_per_org: u32,
    /// Hard timeout for one organization's fetch
    pub fetch_timeout_seconds: u64,
    /// Rate limiting settings
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests per second limit
    pub requests_per_second: u32,
    /// Burst capacity
    pub burst_capacity: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file path or connection string
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Hours between update cycles in continuous mode
    pub interval_hours: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Directory chart artifacts are written to
    pub output_dir: String,
    /// Days of history included in rendered series
    pub window_days: u32,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None, // Will be read from env var
            lookback_days: 30,
            max_repos_per_org: 5,
            fetch_timeout_seconds: 600,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 1,
            burst_capacity: 10,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: ".merge-radar/merge-radar.db".to_string(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { interval_hours: 6 }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            output_dir: "graphs".to_string(),
            window_days: 30,
        }
    }
}

impl Default for MergeRadarConfig {
    fn default() -> Self {
        Self {
            github: GitHubConfig::default(),
            database: DatabaseConfig::default(),
            scheduler: SchedulerConfig::default(),
            graphs: GraphConfig::default(),
            tracked_orgs: Vec::new(),
        }
    }
}

impl MergeRadarConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (merge-radar.toml)
    /// 3. Environment variables (prefixed with MERGE_RADAR__)
    pub fn load() -> Result<Self> {
        let mut builder = Config::builder();

        if Path::new("merge-radar.toml").exists() {
            builder = builder.add_source(File::with_name("merge-radar"));
        }

        builder = builder.add_source(
            Environment::with_prefix("MERGE_RADAR")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let mut radar_config: MergeRadarConfig = config.try_deserialize()?;

        // Special handling for GitHub token - check multiple sources
        if radar_config.github.token.is_none() {
            if let Ok(token) = std::env::var("GITHUB_TOKEN") {
                radar_config.github.token = Some(token);
            } else if let Ok(token) = std::env::var("MERGE_RADAR_GITHUB_TOKEN") {
                radar_config.github.token = Some(token);
            }
        }

        Ok(radar_config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<MergeRadarConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        let _ = MergeRadarConfig::load_env_file();
        MergeRadarConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static MergeRadarConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let _config = config()?;
    tracing::info!("Configuration loaded successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = MergeRadarConfig::default();
        assert_eq!(config.scheduler.interval_hours, 6);
        assert_eq!(config.github.lookback_days, 30);
        assert_eq!(config.github.max_repos_per_org, 5);
        assert!(config.tracked_orgs.is_empty());
    }
}
