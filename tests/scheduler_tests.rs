//! Scheduler state machine tests. Paused tokio time lets the continuous mode
//! run many iterations without real hours passing.

use async_trait::async_trait;
use merge_radar::filter::ActiveOrgFilter;
use merge_radar::graph::{ChartDataRenderer, GraphPipeline};
use merge_radar::scheduler::{RunMode, SchedulerState, UpdateScheduler};
use merge_radar::source::{FetchError, MetricSource};
use merge_radar::store::Database;
use merge_radar::trend::TrendAnalyzer;
use merge_radar::updater::SnapshotUpdater;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct ScriptedSource {
    values: Mutex<HashMap<String, f64>>,
    failing: Mutex<HashSet<String>>,
    fetch_count: AtomicUsize,
}

impl ScriptedSource {
    fn set(&self, org: &str, value: f64) {
        self.values.lock().unwrap().insert(org.to_string(), value);
    }

    fn fail(&self, org: &str) {
        self.failing.lock().unwrap().insert(org.to_string());
    }

    fn fetches(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetricSource for ScriptedSource {
    async fn fetch(&self, org: &str) -> Result<f64, FetchError> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(org) {
            return Err(FetchError::OrgNotFound(org.to_string()));
        }
        self.values
            .lock()
            .unwrap()
            .get(org)
            .copied()
            .ok_or_else(|| FetchError::OrgNotFound(org.to_string()))
    }
}

async fn scheduler_with(
    source: Arc<ScriptedSource>,
    tracked: &[&str],
    output_dir: &std::path::Path,
) -> (UpdateScheduler, merge_radar::StopHandle, Database) {
    let database = Database::connect_in_memory()
        .await
        .expect("in-memory database");

    let updater = SnapshotUpdater::new(
        source,
        database.current(),
        database.history(),
    );
    let pipeline = GraphPipeline::new(
        ActiveOrgFilter::new(database.current()),
        database.history(),
        TrendAnalyzer::default(),
    );

    let (scheduler, stop) = UpdateScheduler::new(
        updater,
        pipeline,
        Arc::new(ChartDataRenderer::new()),
        tracked.iter().map(|s| s.to_string()).collect(),
        7,
        output_dir.to_path_buf(),
    );
    (scheduler, stop, database)
}

#[tokio::test]
async fn once_mode_runs_exactly_one_cycle_then_stops() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(ScriptedSource::default());
    source.set("alpha", 3.0);
    source.set("beta", 4.0);

    let (mut scheduler, _stop, database) =
        scheduler_with(source.clone(), &["alpha", "beta"], dir.path()).await;

    assert_eq!(scheduler.state(), SchedulerState::Idle);
    scheduler.run(RunMode::Once).await.expect("clean run");
    assert_eq!(scheduler.state(), SchedulerState::Stopped);

    // One fetch per tracked organization, no repeats
    assert_eq!(source.fetches(), 2);

    let active = database.current().list_active_orgs().await.unwrap();
    assert_eq!(active.len(), 2);

    // Render pass happened: aggregate plus both organizations
    assert!(dir.path().join("overall_trend.json").exists());
    assert!(dir.path().join("organizations/alpha.json").exists());
    assert!(dir.path().join("organizations/beta.json").exists());
}

#[tokio::test]
async fn once_mode_propagates_iteration_failure() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(ScriptedSource::default());
    source.set("alpha", 3.0);
    source.fail("beta");

    let (mut scheduler, _stop, database) =
        scheduler_with(source.clone(), &["alpha", "beta"], dir.path()).await;

    let result = scheduler.run(RunMode::Once).await;
    assert!(result.is_err(), "partial failure should fail Once mode");
    assert_eq!(scheduler.state(), SchedulerState::Stopped);

    // The healthy organization was still committed before the error surfaced
    let active = database.current().list_active_orgs().await.unwrap();
    assert!(active.contains("alpha"));
    assert!(!active.contains("beta"));
}

#[tokio::test(start_paused = true)]
async fn continuous_mode_iterates_without_real_time_and_honors_stop() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(ScriptedSource::default());
    source.set("alpha", 3.0);

    // Resume real time for database setup: sqlx establishes the SQLite
    // connection on a real thread, and the paused clock would auto-advance
    // past the pool's acquire timeout before it finishes.
    tokio::time::resume();
    let (mut scheduler, stop, _database) =
        scheduler_with(source.clone(), &["alpha"], dir.path()).await;
    tokio::time::pause();

    let handle = tokio::spawn(async move {
        scheduler
            .run(RunMode::Continuous {
                interval: Duration::from_secs(6 * 3600),
            })
            .await
            .expect("continuous run ends cleanly");
        scheduler
    });

    // Paused time auto-advances through the 6-hour sleeps; step virtual time
    // forward until several iterations have happened
    let mut steps = 0usize;
    while source.fetches() < 3 {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        steps += 1;
        assert!(steps < 1_000, "scheduler never iterated");
    }

    stop.stop();
    let scheduler = handle.await.expect("scheduler task joins");

    assert_eq!(scheduler.state(), SchedulerState::Stopped);
    assert!(source.fetches() >= 3);
}

#[tokio::test(start_paused = true)]
async fn continuous_mode_survives_failing_iterations() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(ScriptedSource::default());
    // Every fetch fails; every iteration reports an error
    source.fail("alpha");

    // See continuous_mode_iterates_without_real_time_and_honors_stop: database
    // setup needs real time under the paused clock.
    tokio::time::resume();
    let (mut scheduler, stop, _database) =
        scheduler_with(source.clone(), &["alpha"], dir.path()).await;
    tokio::time::pause();

    let handle = tokio::spawn(async move {
        scheduler
            .run(RunMode::continuous_hours(6))
            .await
            .expect("failures are retried, not fatal");
        scheduler
    });

    let mut steps = 0usize;
    while source.fetches() < 2 {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        steps += 1;
        assert!(steps < 1_000, "scheduler stopped after a failed iteration");
    }

    stop.stop();
    let scheduler = handle.await.expect("scheduler task joins");
    assert_eq!(scheduler.state(), SchedulerState::Stopped);
}

#[tokio::test]
async fn stop_before_run_prevents_any_iteration() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(ScriptedSource::default());
    source.set("alpha", 3.0);

    let (mut scheduler, stop, _database) =
        scheduler_with(source.clone(), &["alpha"], dir.path()).await;

    stop.stop();
    scheduler
        .run(RunMode::continuous_hours(6))
        .await
        .expect("stopped run exits cleanly");

    assert_eq!(scheduler.state(), SchedulerState::Stopped);
    assert_eq!(source.fetches(), 0);
}
