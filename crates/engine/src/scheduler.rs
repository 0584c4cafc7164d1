//! Recurring batch scheduler
//!
//! Two phases: `Idle` until the initial delay elapses, then `Running` with a
//! fixed-period ticker. Each tick runs the batch inline, so the scheduler
//! itself never overlaps runs; ticks missed while a batch is running are
//! skipped, and a tick that finds a manually triggered batch in flight is
//! skipped as well.

use crate::engine::{BatchReport, BatchRunner};
use crate::error::EngineError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    /// Waiting out the initial delay
    Idle,
    /// Periodic ticker armed
    Running,
    /// Shut down
    Stopped,
}

pub struct Scheduler {
    runner: Arc<dyn BatchRunner>,
    initial_delay: Duration,
    period: Duration,
    phase: watch::Sender<SchedulerPhase>,
}

impl Scheduler {
    pub fn new(runner: Arc<dyn BatchRunner>, initial_delay: Duration, period: Duration) -> Self {
        let (phase, _) = watch::channel(SchedulerPhase::Idle);
        Self {
            runner,
            initial_delay,
            period,
            phase,
        }
    }

    pub fn phase(&self) -> SchedulerPhase {
        *self.phase.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerPhase> {
        self.phase.subscribe()
    }

    /// Run on a background task until `shutdown` flips to `true`.
    pub fn spawn(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }

    /// Drive the schedule until `shutdown` flips to `true` or its sender
    /// is dropped. A batch in flight is allowed to finish.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Scheduler armed: first batch in {:?}, then every {:?}",
            self.initial_delay, self.period
        );

        tokio::select! {
            _ = tokio::time::sleep(self.initial_delay) => {}
            _ = shutdown_requested(&mut shutdown) => {
                self.stop();
                return;
            }
        }

        self.phase.send_replace(SchedulerPhase::Running);

        let mut ticker = interval_at(Instant::now(), self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.run_once().await,
                _ = shutdown_requested(&mut shutdown) => break,
            }
        }

        self.stop();
    }

    fn stop(&self) {
        self.phase.send_replace(SchedulerPhase::Stopped);
        info!("Scheduler stopped");
    }

    /// One scheduled run. Errors are logged, never propagated.
    async fn run_once(&self) {
        match self.runner.try_run_batch().await {
            Ok(BatchReport::Skipped { hours_until_next }) => {
                info!("Scheduled batch skipped, faucet reopens in {}h", hours_until_next);
            }
            Ok(BatchReport::Completed { succeeded, failed, total, .. }) => {
                info!(
                    "Scheduled batch complete: {}/{} succeeded, {} failed",
                    succeeded, total, failed
                );
            }
            Err(EngineError::BatchInProgress) => {
                warn!("Batch already in progress, skipping scheduled tick");
            }
            Err(e) => {
                error!("Scheduled batch failed: {}", e);
            }
        }
    }
}

async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
