use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::{ensure, Context};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::{task::JoinHandle, time::timeout};

use crate::{
    cron::CronEntry,
    error::{CronError, LogError},
    lifecycle::LifecycleHooks,
    short_name,
    time::{Clock, Sleeper, SystemClock, TokioSleeper},
    Never,
};

#[async_trait]
pub trait Job: Send + Sync {
    async fn run_once(&self) -> anyhow::Result<()>;

    fn name(&self) -> String {
        short_name::<Self>()
    }
}

#[async_trait]
impl<F: Fn() + Send + Sync> Job for F {
    async fn run_once(&self) -> anyhow::Result<()> {
        self();
        Ok(())
    }
}

#[async_trait]
pub trait Service: Send + Sync {
    /// The service is never expected to stop, it should do its job until
    /// externally shutdown.
    async fn run_forever(&self) -> Never;

    /// The name used to represent the service in the logs
    fn name(&self) -> String {
        short_name::<Self>()
    }

    /// The service should be able to self-diagnose any internal issues and
    /// report if there is a problem.
    fn is_healthy(&self) -> bool;
}

#[derive(Clone, Debug)]
pub struct ScheduleConfig {
    /// A run that takes longer than this is cancelled and counted as a
    /// failure.
    pub max_run_time: Duration,
    /// The service reports itself unhealthy once this many runs in a row
    /// have failed.
    pub max_consecutive_failures: usize,
}

impl ScheduleConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            !self.max_run_time.is_zero(),
            "max_run_time must be positive"
        );
        ensure!(
            self.max_consecutive_failures > 0,
            "max_consecutive_failures must be positive"
        );
        Ok(())
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            max_run_time: Duration::from_secs(60),
            max_consecutive_failures: 3,
        }
    }
}

/// Runs a job at every time a cron entry selects.
pub struct ScheduledJobService {
    job: Arc<dyn Job>,
    entry: CronEntry,
    config: ScheduleConfig,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
    /// Number of consecutive failures that have happened until now without any
    /// successes.
    consecutive_failures: AtomicUsize,
    /// Set once the entry has no more running times.
    exhausted: AtomicBool,
    last_fire: Mutex<Option<i64>>,
}

impl ScheduledJobService {
    pub fn new<J: Job + 'static>(
        job: J,
        entry: CronEntry,
        config: ScheduleConfig,
    ) -> anyhow::Result<Self> {
        config
            .validate()
            .with_context(|| format!("invalid schedule config for {}", job.name()))?;
        Ok(Self {
            job: Arc::new(job),
            entry,
            config,
            clock: Arc::new(SystemClock),
            sleeper: Arc::new(TokioSleeper::default()),
            consecutive_failures: 0.into(),
            exhausted: false.into(),
            last_fire: Mutex::new(None),
        })
    }

    pub fn with_time(mut self, clock: Arc<dyn Clock>, sleeper: Arc<dyn Sleeper>) -> Self {
        self.clock = clock;
        self.sleeper = sleeper;
        self
    }

    pub fn entry(&self) -> &CronEntry {
        &self.entry
    }

    /// When the job was last due, in epoch milliseconds.
    pub fn last_fire(&self) -> Option<i64> {
        *self.last_fire.lock()
    }

    pub fn consecutive_failures(&self) -> usize {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    /// Waits for the next running time and runs the job once.
    ///
    /// The next time is computed from the later of now and the previous
    /// running time, so a slow clock never fires the same slot twice.
    /// Returns the running time that was served. Job failures are logged and
    /// counted, not returned.
    pub async fn tick(&self) -> Result<i64, CronError> {
        let now = self.clock.current_millis();
        let reference = self.last_fire().map_or(now, |last| last.max(now));
        let fire_at = self.entry.next_running_time(reference)?;
        let wait = fire_at - self.clock.current_millis();
        if wait > 0 {
            self.sleeper.sleep(Duration::from_millis(wait as u64)).await;
        }

        tracing::debug!("Running {} for {}", self.job.name(), self.entry);
        let success = timeout(self.config.max_run_time, self.job.run_once())
            .await
            .map_err(anyhow::Error::from)
            .and_then(|result| result)
            .log_with_context(|| format!("Scheduled run of {} at {fire_at}", self.job.name()));
        match success {
            Some(()) => self.consecutive_failures.store(0, Ordering::Relaxed),
            None => {
                self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
            }
        }
        *self.last_fire.lock() = Some(fire_at);
        Ok(fire_at)
    }
}

#[async_trait]
impl Service for ScheduledJobService {
    async fn run_forever(&self) -> Never {
        loop {
            if let Err(e) = self.tick().await {
                tracing::error!("{} will not run again: {e}", self.name());
                self.exhausted.store(true, Ordering::Relaxed);
                return futures::future::pending().await;
            }
        }
    }

    fn name(&self) -> String {
        self.job.name()
    }

    fn is_healthy(&self) -> bool {
        !self.exhausted.load(Ordering::Relaxed)
            && self.consecutive_failures() < self.config.max_consecutive_failures
    }
}

/// Lifecycle hooks that spawn a service on start and abort it on stop, so
/// services can be managed as beans.
///
/// Starting requires a tokio runtime on the current thread.
pub struct ScheduledTask {
    service: Arc<dyn Service>,
    handle: Option<JoinHandle<Never>>,
}

impl ScheduledTask {
    pub fn new<S: Service + 'static>(service: S) -> Self {
        Self {
            service: Arc::new(service),
            handle: None,
        }
    }

    pub fn service(&self) -> &Arc<dyn Service> {
        &self.service
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl LifecycleHooks for ScheduledTask {
    fn do_start(&mut self) -> anyhow::Result<()> {
        ensure!(
            self.handle.is_none(),
            "Cannot start service, already running: {}",
            self.service.name()
        );
        let runtime = tokio::runtime::Handle::try_current()
            .with_context(|| format!("{} needs a tokio runtime to start", self.service.name()))?;
        tracing::info!("Starting service: {}", self.service.name());
        let svc = self.service.clone();
        self.handle = Some(runtime.spawn(async move { svc.run_forever().await }));
        Ok(())
    }

    fn do_stop(&mut self) -> anyhow::Result<()> {
        if let Some(handle) = self.handle.take() {
            tracing::info!("Aborting service: {}", self.service.name());
            handle.abort();
        }
        Ok(())
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
