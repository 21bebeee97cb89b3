use std::{
    sync::atomic::{AtomicI64, Ordering},
    time::{Duration, SystemTime},
};

use async_trait::async_trait;

pub trait Clock: Send + Sync {
    /// Milliseconds since the unix epoch.
    fn current_millis(&self) -> i64;
}

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn current_millis(&self) -> i64 {
        match SystemTime::now().duration_since(SystemTime::UNIX_EPOCH) {
            Ok(elapsed) => elapsed.as_millis() as i64,
            Err(before) => -(before.duration().as_millis() as i64),
        }
    }
}

/// A clock that only moves when told to.
#[derive(Default)]
pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub fn new(millis: i64) -> Self {
        Self(AtomicI64::new(millis))
    }

    pub fn set(&self, millis: i64) {
        self.0.store(millis, Ordering::Relaxed);
    }

    pub fn advance(&self, duration: Duration) {
        self.0
            .fetch_add(duration.as_millis() as i64, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn current_millis(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}

pub struct TokioSleeper(pub u32);

impl TokioSleeper {
    pub const fn default() -> Self {
        Self(1)
    }

    pub const fn accelerated(scale: u32) -> Self {
        Self(scale)
    }
}

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration / self.0).await
    }
}

/// Never sleeps.
pub struct Insomniac;

#[async_trait]
impl Sleeper for Insomniac {
    async fn sleep(&self, _duration: Duration) {}
}
