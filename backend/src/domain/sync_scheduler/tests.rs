//! Timer-driven coverage on a paused tokio clock.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::*;
use crate::domain::InstanceSyncConfig;
use crate::domain::ports::InstanceStoreError;
use crate::outbound::cache::InMemoryInstanceCache;
use crate::test_support::instances::{NoJitter, ScriptedInstanceStore, instance_row};

const INTERVAL: Duration = Duration::from_secs(10);

struct Harness {
    store: Arc<ScriptedInstanceStore>,
    scheduler: Arc<SyncScheduler>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

fn start(store: Arc<ScriptedInstanceStore>) -> Harness {
    start_with(
        store,
        SyncSchedulerConfig {
            interval: INTERVAL,
            max_backoff: Duration::from_secs(300),
        },
        Arc::new(NoJitter),
    )
}

fn start_with(
    store: Arc<ScriptedInstanceStore>,
    config: SyncSchedulerConfig,
    jitter: Arc<dyn BackoffJitter>,
) -> Harness {
    let service = Arc::new(InstanceSyncService::new(
        store.clone(),
        Arc::new(InMemoryInstanceCache::new()),
        InstanceSyncConfig {
            store_timeout: Duration::from_secs(3600),
            ..InstanceSyncConfig::default()
        },
    ));
    let scheduler = Arc::new(SyncScheduler::with_jitter(service, config, jitter));
    let (shutdown, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn({
        let scheduler = Arc::clone(&scheduler);
        async move { scheduler.run(shutdown_rx).await }
    });
    Harness {
        store,
        scheduler,
        shutdown,
        task,
    }
}

async fn wait_for_status(
    scheduler: &SyncScheduler,
    predicate: impl FnMut(&SchedulerStatus) -> bool,
) -> SchedulerStatus {
    let mut status = scheduler.subscribe();
    status
        .wait_for(predicate)
        .await
        .expect("scheduler status channel open")
        .clone()
}

impl Harness {
    async fn stop(self) -> Arc<SyncScheduler> {
        self.shutdown.send(true).expect("scheduler listening");
        self.task.await.expect("scheduler task joins");
        self.scheduler
    }
}

fn within_a_second_of(elapsed: Duration, expected: Duration) -> bool {
    elapsed >= expected && elapsed < expected + Duration::from_secs(1)
}

#[tokio::test(start_paused = true)]
async fn passes_start_immediately_then_follow_the_interval() {
    let started = Instant::now();
    let harness = start(Arc::new(ScriptedInstanceStore::new(vec![instance_row(
        "u1", "p1",
    )])));

    let status = wait_for_status(&harness.scheduler, |status| {
        status.passes_started == 3 && status.state == SyncCycleState::Completed
    })
    .await;

    assert!(within_a_second_of(started.elapsed(), INTERVAL * 2));
    assert_eq!(status.ticks_skipped, 0);
    assert_eq!(status.consecutive_failures, 0);
    assert_eq!(
        status.last_report.map(|report| report.written),
        Some(1)
    );
    assert_eq!(harness.store.calls(), 3);
    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn ticks_during_a_running_pass_are_skipped() {
    let store = Arc::new(ScriptedInstanceStore::new(vec![instance_row("u1", "p1")]));
    store.set_blocking(true);
    let harness = start(store.clone());
    store.wait_until_entered().await;

    let status = wait_for_status(&harness.scheduler, |status| status.ticks_skipped >= 2).await;

    assert_eq!(status.state, SyncCycleState::Running);
    assert_eq!(status.passes_started, 1);
    assert_eq!(store.calls(), 1);

    store.set_blocking(false);
    store.release();
    let status = wait_for_status(&harness.scheduler, |status| status.passes_started >= 2).await;
    assert_eq!(status.consecutive_failures, 0);
    assert_eq!(store.max_active(), 1);
    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn failed_passes_back_off_exponentially() {
    let store = Arc::new(ScriptedInstanceStore::new(vec![instance_row("u1", "p1")]));
    store.push_failure(InstanceStoreError::connection("connection refused"));
    store.push_failure(InstanceStoreError::query("server closed the connection"));
    let started = Instant::now();
    let harness = start(store.clone());

    let status = wait_for_status(&harness.scheduler, |status| {
        status.consecutive_failures == 2 && status.state == SyncCycleState::Failed
    })
    .await;
    assert!(within_a_second_of(started.elapsed(), INTERVAL));
    assert_eq!(status.last_report, None);

    // The second failure doubles the wait: the next pass lands at 3x interval
    // instead of 2x.
    let status = wait_for_status(&harness.scheduler, |status| {
        status.passes_started == 3 && status.state == SyncCycleState::Completed
    })
    .await;
    assert!(within_a_second_of(started.elapsed(), INTERVAL * 3));
    assert_eq!(status.consecutive_failures, 0);
    assert_eq!(store.calls(), 3);
    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_aborts_the_pass_in_flight() {
    let store = Arc::new(ScriptedInstanceStore::new(vec![instance_row("u1", "p1")]));
    store.set_blocking(true);
    let harness = start(store.clone());
    store.wait_until_entered().await;

    let scheduler = harness.stop().await;

    let status = scheduler.status();
    assert_eq!(status.state, SyncCycleState::Failed);
    assert_eq!(status.passes_started, 1);
    assert_eq!(status.last_report, None);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_shutdown_sender_stops_the_scheduler() {
    let harness = start(Arc::new(ScriptedInstanceStore::new(Vec::new())));
    wait_for_status(&harness.scheduler, |status| {
        status.state == SyncCycleState::Completed
    })
    .await;

    let Harness { shutdown, task, .. } = harness;
    drop(shutdown);

    task.await.expect("scheduler task joins");
}

/// Saturates every backoff to the largest representable delay.
struct MaxJitter;

impl BackoffJitter for MaxJitter {
    fn jittered_delay(&self, _base: Duration, _failures: u32) -> Duration {
        Duration::MAX
    }
}

#[tokio::test(start_paused = true)]
async fn oversized_interval_parks_the_next_tick_instead_of_panicking() {
    let store = Arc::new(ScriptedInstanceStore::new(vec![instance_row("u1", "p1")]));
    let harness = start_with(
        store.clone(),
        SyncSchedulerConfig {
            interval: Duration::from_secs(u64::MAX),
            max_backoff: Duration::from_secs(u64::MAX),
        },
        Arc::new(NoJitter),
    );
    wait_for_status(&harness.scheduler, |status| {
        status.passes_started == 1 && status.state == SyncCycleState::Completed
    })
    .await;

    tokio::time::advance(Duration::from_secs(86_400)).await;

    assert_eq!(harness.scheduler.status().passes_started, 1);
    assert!(!harness.task.is_finished());
    assert_eq!(store.calls(), 1);
    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn oversized_backoff_parks_the_next_tick_instead_of_panicking() {
    let store = Arc::new(ScriptedInstanceStore::new(vec![instance_row("u1", "p1")]));
    store.push_failure(InstanceStoreError::connection("connection refused"));
    let harness = start_with(
        store.clone(),
        SyncSchedulerConfig {
            interval: INTERVAL,
            max_backoff: Duration::from_secs(300),
        },
        Arc::new(MaxJitter),
    );
    wait_for_status(&harness.scheduler, |status| {
        status.consecutive_failures == 1 && status.state == SyncCycleState::Failed
    })
    .await;

    tokio::time::advance(INTERVAL * 100).await;

    assert_eq!(harness.scheduler.status().passes_started, 1);
    assert!(!harness.task.is_finished());
    harness.stop().await;
}

#[test]
fn deadlines_past_the_end_of_time_are_clamped() {
    let now = Instant::now();

    assert_eq!(deadline_after(now, INTERVAL), now + INTERVAL);
    assert!(deadline_after(now, Duration::MAX) > now + INTERVAL);
}

#[test]
fn backoff_doubles_up_to_the_cap() {
    let service = Arc::new(InstanceSyncService::new(
        Arc::new(ScriptedInstanceStore::new(Vec::new())),
        Arc::new(InMemoryInstanceCache::new()),
        InstanceSyncConfig::default(),
    ));
    let scheduler = SyncScheduler::new(
        service,
        SyncSchedulerConfig {
            interval: Duration::from_secs(60),
            max_backoff: Duration::from_secs(300),
        },
    );

    let delays: Vec<_> = (1..=5)
        .map(|failures| scheduler.backoff_base(failures).as_secs())
        .collect();

    assert_eq!(delays, vec![60, 120, 240, 300, 300]);
}

#[test]
fn backoff_never_undercuts_the_interval() {
    let service = Arc::new(InstanceSyncService::new(
        Arc::new(ScriptedInstanceStore::new(Vec::new())),
        Arc::new(InMemoryInstanceCache::new()),
        InstanceSyncConfig::default(),
    ));
    let scheduler = SyncScheduler::new(
        service,
        SyncSchedulerConfig {
            interval: Duration::from_secs(600),
            max_backoff: Duration::from_secs(300),
        },
    );

    assert_eq!(scheduler.backoff_base(3), Duration::from_secs(600));
}
