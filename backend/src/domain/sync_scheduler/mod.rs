//! Recurring driver for [`InstanceSyncService`] passes.
//!
//! The scheduler ticks on a fixed cadence. A tick starts a pass on a spawned
//! task unless one is still in flight, in which case the tick is dropped.
//! Failed passes push the next tick out by a jittered, capped exponential
//! backoff; the scheduler itself never stops on a pass failure and only
//! exits when the shutdown channel fires.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, sleep_until};
use tracing::{error, info, warn};

use super::instance_sync::{InstanceSyncService, SyncPassError, SyncPassReport};

mod runtime;

pub use runtime::{BackoffJitter, RandomJitter};

/// Scheduler timing configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSchedulerConfig {
    /// Cadence between pass starts when passes succeed.
    pub interval: Duration,
    /// Cap on the failure backoff before jitter.
    pub max_backoff: Duration,
}

impl Default for SyncSchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            max_backoff: Duration::from_secs(300),
        }
    }
}

/// Lifecycle of the most recent sync cycle.
///
/// `Completed` and `Failed` are idle states: the scheduler waits for the next
/// tick from either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncCycleState {
    /// No pass has run yet.
    #[default]
    Idle,
    /// A pass is executing.
    Running,
    /// The last pass finished.
    Completed,
    /// The last pass failed or was aborted.
    Failed,
}

/// Snapshot published after every scheduler transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStatus {
    pub state: SyncCycleState,
    /// Passes started by the scheduler.
    pub passes_started: u64,
    /// Ticks dropped because a pass was still running.
    pub ticks_skipped: u64,
    /// Failed passes since the last success.
    pub consecutive_failures: u32,
    /// Report of the most recent successful pass.
    pub last_report: Option<SyncPassReport>,
}

type PassHandle = JoinHandle<Result<SyncPassReport, SyncPassError>>;

/// Single-flight timer loop around an [`InstanceSyncService`].
pub struct SyncScheduler {
    service: Arc<InstanceSyncService>,
    config: SyncSchedulerConfig,
    jitter: Arc<dyn BackoffJitter>,
    status: watch::Sender<SchedulerStatus>,
}

impl SyncScheduler {
    /// Build a scheduler with random backoff jitter.
    pub fn new(service: Arc<InstanceSyncService>, config: SyncSchedulerConfig) -> Self {
        Self::with_jitter(service, config, Arc::new(RandomJitter))
    }

    /// Build a scheduler with an injected jitter strategy.
    pub fn with_jitter(
        service: Arc<InstanceSyncService>,
        config: SyncSchedulerConfig,
        jitter: Arc<dyn BackoffJitter>,
    ) -> Self {
        let (status, _) = watch::channel(SchedulerStatus::default());
        Self {
            service,
            config,
            jitter,
            status,
        }
    }

    /// Subscribe to status snapshots.
    pub fn subscribe(&self) -> watch::Receiver<SchedulerStatus> {
        self.status.subscribe()
    }

    /// Latest status snapshot.
    pub fn status(&self) -> SchedulerStatus {
        self.status.borrow().clone()
    }

    /// Drive passes until `shutdown` turns `true` or its sender is dropped.
    ///
    /// The first pass starts immediately. On shutdown an in-flight pass is
    /// aborted.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut in_flight: Option<PassHandle> = None;
        let mut next_tick = Instant::now();
        info!(interval = ?self.config.interval, "sync scheduler started");

        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                joined = join_in_flight(&mut in_flight) => {
                    in_flight = None;
                    if let Some(delay) = self.finish_pass(joined) {
                        next_tick = next_tick.max(deadline_after(Instant::now(), delay));
                    }
                }
                () = sleep_until(next_tick) => {
                    if in_flight.is_some() {
                        warn!("sync pass still running; skipping tick");
                        self.status.send_modify(|status| status.ticks_skipped += 1);
                    } else {
                        in_flight = Some(self.start_pass());
                    }
                    next_tick = deadline_after(next_tick, self.config.interval);
                }
            }
        }

        if let Some(handle) = in_flight.take() {
            handle.abort();
            self.status
                .send_modify(|status| status.state = SyncCycleState::Failed);
            warn!("sync scheduler stopped with a pass in flight; pass aborted");
        }
        info!("sync scheduler stopped");
    }

    fn start_pass(&self) -> PassHandle {
        self.status.send_modify(|status| {
            status.state = SyncCycleState::Running;
            status.passes_started += 1;
        });
        let service = Arc::clone(&self.service);
        tokio::spawn(async move { service.run_pass().await })
    }

    /// Record a finished pass and return the backoff delay when it failed.
    fn finish_pass(
        &self,
        joined: Result<Result<SyncPassReport, SyncPassError>, JoinError>,
    ) -> Option<Duration> {
        let failure = match joined {
            Ok(Ok(report)) => {
                self.status.send_modify(|status| {
                    status.state = SyncCycleState::Completed;
                    status.consecutive_failures = 0;
                    status.last_report = Some(report);
                });
                return None;
            }
            Ok(Err(error)) => error.to_string(),
            Err(join_error) => {
                error!(error = %join_error, "sync pass task did not complete");
                join_error.to_string()
            }
        };

        let mut failures = 0;
        self.status.send_modify(|status| {
            status.state = SyncCycleState::Failed;
            status.consecutive_failures = status.consecutive_failures.saturating_add(1);
            failures = status.consecutive_failures;
        });
        let delay = self
            .jitter
            .jittered_delay(self.backoff_base(failures), failures);
        warn!(
            error = %failure,
            consecutive_failures = failures,
            retry_in = ?delay,
            "sync pass failed"
        );
        Some(delay)
    }

    fn backoff_base(&self, failures: u32) -> Duration {
        let exponent = 2_u32.saturating_pow(failures.saturating_sub(1));
        self.config
            .interval
            .saturating_mul(exponent)
            .min(self.config.max_backoff.max(self.config.interval))
    }
}

/// Roughly thirty years; stands in for deadlines that overflow `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `from + delay`, clamped to a far-future instant instead of overflowing.
fn deadline_after(from: Instant, delay: Duration) -> Instant {
    from.checked_add(delay)
        .or_else(|| from.checked_add(FAR_FUTURE))
        .unwrap_or(from)
}

async fn join_in_flight(
    in_flight: &mut Option<PassHandle>,
) -> Result<Result<SyncPassReport, SyncPassError>, JoinError> {
    match in_flight {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests;
