use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use merge_radar::config::{self, MergeRadarConfig};
use merge_radar::filter::ActiveOrgFilter;
use merge_radar::graph::{ChartDataRenderer, GraphPipeline, Renderer};
use merge_radar::scheduler::{RunMode, UpdateScheduler};
use merge_radar::source::GitHubMetricSource;
use merge_radar::store::Database;
use merge_radar::trend::TrendAnalyzer;
use merge_radar::updater::SnapshotUpdater;
use merge_radar::{init_telemetry, shutdown_telemetry};

#[derive(Parser)]
#[command(name = "merge-radar")]
#[command(about = "Track merge activity trends across GitHub organizations")]
#[command(long_about = "merge-radar periodically samples merges-per-day for a set of GitHub \
                       organizations, keeps the latest value plus a full snapshot history, and \
                       renders trend series for the organizations currently tracked. Run \
                       'merge-radar update' for a single cycle or 'merge-radar watch' to keep \
                       updating on an interval.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one update cycle and one render pass, then exit
    Update,
    /// Run update cycles continuously on a fixed interval
    Watch {
        /// Hours between update cycles
        #[arg(long, help = "Override the configured interval between cycles")]
        interval_hours: Option<u64>,
    },
    /// Build trend series and chart artifacts from stored history
    Graph {
        /// Days of history to include
        #[arg(long, help = "Override the configured graph window")]
        window_days: Option<u32>,
        /// Render a single organization instead of all active ones
        #[arg(long, help = "Organization slug; must be currently active")]
        org: Option<String>,
    },
    /// Show tracked organizations and their latest sampled values
    Status,
    /// Drop an organization from current tracking (history is retained)
    Deactivate {
        /// Organization slug to deactivate
        org: String,
    },
}

fn main() -> Result<()> {
    init_telemetry()?;
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Update => {
            tokio::runtime::Runtime::new()?.block_on(async { update_command().await })
        }
        Commands::Watch { interval_hours } => {
            tokio::runtime::Runtime::new()?.block_on(async { watch_command(interval_hours).await })
        }
        Commands::Graph { window_days, org } => tokio::runtime::Runtime::new()?
            .block_on(async { graph_command(window_days, org).await }),
        Commands::Status => {
            tokio::runtime::Runtime::new()?.block_on(async { status_command().await })
        }
        Commands::Deactivate { org } => {
            tokio::runtime::Runtime::new()?.block_on(async { deactivate_command(&org).await })
        }
    };

    shutdown_telemetry();
    result
}

/// Shared wiring: config -> database -> stores -> source -> pipeline.
struct App {
    config: &'static MergeRadarConfig,
    database: Database,
}

impl App {
    async fn init() -> Result<Self> {
        let config = config::config()?;

        if let Some(parent) = PathBuf::from(&config.database.url).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }

        let database = Database::connect(&config.database.url)
            .await
            .with_context(|| format!("opening database at {}", config.database.url))?;

        Ok(Self { config, database })
    }

    fn pipeline(&self) -> GraphPipeline {
        GraphPipeline::new(
            ActiveOrgFilter::new(self.database.current()),
            self.database.history(),
            TrendAnalyzer::default(),
        )
    }

    fn scheduler(&self) -> Result<(UpdateScheduler, merge_radar::StopHandle)> {
        let source = GitHubMetricSource::from_config(&self.config.github)
            .context("building GitHub metric source")?;
        let updater = SnapshotUpdater::new(
            Arc::new(source),
            self.database.current(),
            self.database.history(),
        );

        Ok(UpdateScheduler::new(
            updater,
            self.pipeline(),
            Arc::new(ChartDataRenderer::new()),
            self.config.tracked_orgs.clone(),
            self.config.graphs.window_days,
            PathBuf::from(&self.config.graphs.output_dir),
        ))
    }
}

async fn update_command() -> Result<()> {
    let app = App::init().await?;

    if app.config.tracked_orgs.is_empty() {
        println!("No tracked organizations configured.");
        println!("Add slugs under 'tracked_orgs' in merge-radar.toml and re-run.");
        return Ok(());
    }

    println!(
        "Running one update cycle for {} organizations...",
        app.config.tracked_orgs.len()
    );

    let (mut scheduler, _stop) = app.scheduler()?;
    let result = scheduler.run(RunMode::Once).await;
    app.database.close().await;

    match result {
        Ok(()) => {
            println!("Update complete. Charts written to {}/", app.config.graphs.output_dir);
            Ok(())
        }
        Err(e) => Err(e),
    }
}

async fn watch_command(interval_hours: Option<u64>) -> Result<()> {
    let app = App::init().await?;
    let interval_hours = interval_hours.unwrap_or(app.config.scheduler.interval_hours);

    println!(
        "Starting continuous updates every {interval_hours}h for {} organizations (Ctrl+C to stop)",
        app.config.tracked_orgs.len()
    );

    let (mut scheduler, stop) = app.scheduler()?;

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\nStop requested; finishing current iteration...");
            stop.stop();
        }
    });

    let result = scheduler.run(RunMode::continuous_hours(interval_hours)).await;
    app.database.close().await;
    result
}

async fn graph_command(window_days: Option<u32>, org: Option<String>) -> Result<()> {
    let app = App::init().await?;
    let window_days = window_days.unwrap_or(app.config.graphs.window_days);
    let pipeline = app.pipeline();
    let renderer = ChartDataRenderer::new();
    let output_dir = PathBuf::from(&app.config.graphs.output_dir);

    match org {
        Some(org) => {
            let series = pipeline.organization_series(&org, window_days).await?;
            let trend = pipeline.trend_for(&series, window_days);

            let path = output_dir.join("organizations").join(format!("{org}.json"));
            renderer
                .render(&series, &format!("Merge activity - {org}"), &path)
                .await?;

            println!("{org}: {} samples over {window_days} days", trend.sample_count);
            println!("  slope: {:.3}/day ({:?})", trend.slope, trend.direction);
            match trend.percent_change {
                Some(pct) => println!("  change: {pct:.1}%"),
                None => println!("  change: n/a (window starts at zero)"),
            }
            println!("  chart: {}", path.display());
        }
        None => {
            let report = pipeline.render_all(&renderer, window_days, &output_dir).await?;
            let aggregate = pipeline.aggregate_series(window_days).await?;
            let trend = pipeline.trend_for(&aggregate, window_days);

            println!(
                "Rendered {} charts ({} failed/skipped) to {}/",
                report.rendered,
                report.failed,
                output_dir.display()
            );
            println!(
                "Aggregate trend: slope {:.3}/day ({:?}) over {} samples",
                trend.slope, trend.direction, trend.sample_count
            );
        }
    }

    app.database.close().await;
    Ok(())
}

async fn status_command() -> Result<()> {
    let app = App::init().await?;
    let current = app.database.current();
    let history = app.database.history();

    let records = current.all_records().await?;
    let snapshots = history.snapshot_count().await?;

    if records.is_empty() {
        println!("No active organizations. Run 'merge-radar update' to take a first snapshot.");
    } else {
        println!("Active organizations ({}):", records.len());
        for record in &records {
            println!(
                "  {:<30} {:>8.2} merges/day  (updated {})",
                record.organization_slug,
                record.value,
                record.last_updated.format("%Y-%m-%d %H:%M UTC")
            );
        }
    }
    println!("Historical snapshots stored: {snapshots}");

    app.database.close().await;
    Ok(())
}

async fn deactivate_command(org: &str) -> Result<()> {
    let app = App::init().await?;
    let removed = app.database.current().remove(org).await?;

    if removed {
        println!("Deactivated '{org}'. Its history is retained; it will no longer appear in graphs.");
    } else {
        println!("'{org}' was not active; nothing to do.");
    }

    app.database.close().await;
    Ok(())
}
