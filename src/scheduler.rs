use crate::graph::{GraphPipeline, Renderer};
use crate::updater::SnapshotUpdater;
use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

/// Scheduler lifecycle: Idle -> Running -> (Idle | Stopped).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// One cycle and one render pass, then stop. Iteration failures
    /// propagate to the caller.
    Once,
    /// Repeat until stopped, sleeping `interval` between iterations.
    /// Iteration failures are logged; the next interval retries.
    Continuous { interval: Duration },
}

impl RunMode {
    pub fn continuous_hours(hours: u64) -> Self {
        RunMode::Continuous {
            interval: Duration::from_secs(hours * 3600),
        }
    }
}

/// Requests scheduler shutdown. Latency is bounded: the loop observes the
/// signal at every iteration boundary and inside the interval sleep.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    pub fn stop(&self) {
        let _ = self.tx.send(true);
    }
}

/// Drives the snapshot updater and the render pass, once or on a fixed
/// interval. The sleep is the only suspension point and it is cancellable.
pub struct UpdateScheduler {
    updater: SnapshotUpdater,
    pipeline: GraphPipeline,
    renderer: Arc<dyn Renderer>,
    tracked_orgs: Vec<String>,
    window_days: u32,
    output_dir: PathBuf,
    state: SchedulerState,
    stop_rx: watch::Receiver<bool>,
}

impl UpdateScheduler {
    pub fn new(
        updater: SnapshotUpdater,
        pipeline: GraphPipeline,
        renderer: Arc<dyn Renderer>,
        tracked_orgs: Vec<String>,
        window_days: u32,
        output_dir: PathBuf,
    ) -> (Self, StopHandle) {
        let (tx, stop_rx) = watch::channel(false);
        let scheduler = Self {
            updater,
            pipeline,
            renderer,
            tracked_orgs,
            window_days,
            output_dir,
            state: SchedulerState::Idle,
            stop_rx,
        };
        (scheduler, StopHandle { tx })
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub async fn run(&mut self, mode: RunMode) -> Result<()> {
        let result = match mode {
            RunMode::Once => {
                self.state = SchedulerState::Running;
                let result = self.run_iteration().await;
                self.state = SchedulerState::Stopped;
                result
            }
            RunMode::Continuous { interval } => {
                info!(interval_secs = interval.as_secs(), "starting continuous updates");
                loop {
                    if *self.stop_rx.borrow() {
                        break;
                    }

                    self.state = SchedulerState::Running;
                    if let Err(e) = self.run_iteration().await {
                        // Time-based retry: the next scheduled interval is
                        // the retry, no immediate backoff
                        error!(error = %e, "iteration failed; retrying next interval");
                    }
                    self.state = SchedulerState::Idle;

                    tokio::select! {
                        _ = tokio::time::sleep(interval) => {}
                        changed = self.stop_rx.changed() => {
                            if changed.is_err() || *self.stop_rx.borrow() {
                                break;
                            }
                        }
                    }
                }
                self.state = SchedulerState::Stopped;
                info!("continuous updates stopped");
                Ok(())
            }
        };
        result
    }

    /// One independent iteration: update cycle, then render pass.
    async fn run_iteration(&self) -> Result<()> {
        let report = self.updater.run_cycle(&self.tracked_orgs).await;
        info!(summary = %report.summary(), "cycle complete");

        let render = self
            .pipeline
            .render_all(self.renderer.as_ref(), self.window_days, &self.output_dir)
            .await?;

        if report.failure_count() > 0 {
            return Err(anyhow!(
                "cycle finished with failures: {}",
                report.summary()
            ));
        }
        if render.failed > 0 {
            return Err(anyhow!(
                "{} of {} render targets failed",
                render.failed,
                render.failed + render.rendered
            ));
        }

        Ok(())
    }
}
