//! Periodic and on-demand resync trigger.
//!
//! # Responsibility
//! - Own the background task that resyncs on a fixed interval.
//! - Let foreground callers request an immediate resync after a mutation.
//!
//! # Invariants
//! - At most one resync executes at a time.
//! - On-demand requests wait for the in-flight run, then run once more.
//! - Periodic ticks that find a run in flight are skipped, never queued.
//! - A failed resync is logged and counted; the next tick retries.
//! - Stopping waits for the in-flight run; nothing is cancelled midway.
//! - The run lock is held by the blocking worker itself, so dropping a
//!   `resync_now` future does not release it before the work ends.

use super::projection::{ProjectionService, SyncError};
use crate::clock::Clock;
use crate::repo::event_repo::EventSource;
use crate::repo::schedule_repo::DeviceScheduleStore;
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Default cadence of periodic resyncs.
pub const DEFAULT_RESYNC_INTERVAL: Duration = Duration::from_secs(5 * 60);
const MIN_RESYNC_INTERVAL: Duration = Duration::from_millis(1);

/// Anything that can rebuild the device schedule in one blocking call.
pub trait ScheduleResync: Send + Sync + 'static {
    fn resync(&self) -> Result<usize, SyncError>;
}

impl<E, S, C> ScheduleResync for ProjectionService<E, S, C>
where
    E: EventSource + 'static,
    S: DeviceScheduleStore + 'static,
    C: Clock + 'static,
{
    fn resync(&self) -> Result<usize, SyncError> {
        ProjectionService::resync(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerConfig {
    /// Delay between periodic resyncs.
    pub interval: Duration,
    /// Resync immediately when the task starts instead of after one interval.
    pub run_on_start: bool,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_RESYNC_INTERVAL,
            run_on_start: true,
        }
    }
}

/// Counters since the trigger was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerStats {
    /// Resyncs that executed, successful or not.
    pub runs: u64,
    pub failures: u64,
    /// Periodic ticks coalesced into an in-flight run.
    pub skipped: u64,
}

#[derive(Debug, Clone, Copy)]
enum TriggerSource {
    Periodic,
    OnDemand,
}

impl TriggerSource {
    fn as_str(self) -> &'static str {
        match self {
            Self::Periodic => "periodic",
            Self::OnDemand => "on_demand",
        }
    }
}

/// Serialized entry point to the projection engine.
pub struct ScheduleTrigger {
    engine: Arc<dyn ScheduleResync>,
    config: TriggerConfig,
    run_lock: Arc<Mutex<()>>,
    runs: AtomicU64,
    failures: AtomicU64,
    skipped: AtomicU64,
}

impl ScheduleTrigger {
    pub fn new(engine: Arc<dyn ScheduleResync>, config: TriggerConfig) -> Self {
        let config = TriggerConfig {
            interval: config.interval.max(MIN_RESYNC_INTERVAL),
            ..config
        };
        Self {
            engine,
            config,
            run_lock: Arc::new(Mutex::new(())),
            runs: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &TriggerConfig {
        &self.config
    }

    pub fn stats(&self) -> TriggerStats {
        TriggerStats {
            runs: self.runs.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }

    /// Runs a resync now, after any in-flight run finishes.
    pub async fn resync_now(&self) -> Result<usize, SyncError> {
        let guard = Arc::clone(&self.run_lock).lock_owned().await;
        self.run_locked(guard, TriggerSource::OnDemand).await
    }

    /// Spawns the periodic task on the current tokio runtime.
    ///
    /// Dropping the returned handle also shuts the task down after its
    /// current run.
    pub fn start(self: &Arc<Self>) -> TriggerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let trigger = Arc::clone(self);
        let task = tokio::spawn(async move { trigger.run_loop(shutdown_rx).await });
        TriggerHandle {
            shutdown: shutdown_tx,
            task,
        }
    }

    async fn run_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let interval = self.config.interval;
        info!(
            "event=schedule_trigger module=trigger status=start interval_ms={} run_on_start={}",
            interval.as_millis(),
            self.config.run_on_start
        );

        let first_tick = if self.config.run_on_start {
            Instant::now()
        } else {
            Instant::now() + interval
        };
        let mut ticker = tokio::time::interval_at(first_tick, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("event=schedule_trigger module=trigger status=stopped");
    }

    async fn tick(&self) {
        let Ok(guard) = Arc::clone(&self.run_lock).try_lock_owned() else {
            self.skipped.fetch_add(1, Ordering::Relaxed);
            debug!("event=schedule_trigger module=trigger status=skipped reason=run_in_flight");
            return;
        };
        // Failures are already logged and counted; the next tick retries.
        let _ = self.run_locked(guard, TriggerSource::Periodic).await;
    }

    async fn run_locked(
        &self,
        guard: OwnedMutexGuard<()>,
        source: TriggerSource,
    ) -> Result<usize, SyncError> {
        let engine = Arc::clone(&self.engine);
        let worker = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            engine.resync()
        });
        let result = match worker.await {
            Ok(result) => result,
            Err(join_err) => Err(SyncError::Worker(join_err.to_string())),
        };
        self.runs.fetch_add(1, Ordering::Relaxed);

        match &result {
            Ok(count) => debug!(
                "event=schedule_trigger module=trigger status=ok source={} entry_count={}",
                source.as_str(),
                count
            ),
            Err(err) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                error!(
                    "event=schedule_trigger module=trigger status=error source={} error_code={} error={}",
                    source.as_str(),
                    err.error_code(),
                    err
                );
            }
        }
        result
    }
}

/// Lifecycle handle of a started trigger task.
pub struct TriggerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl TriggerHandle {
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Signals shutdown and waits for the task to exit.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            warn!(
                "event=schedule_trigger module=trigger status=error error_code=task_join_failed error={}",
                err
            );
        }
    }
}
