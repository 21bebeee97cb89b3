//! Femto Frame is a small framework providing a bean lifecycle state machine
//! and a cron schedule calculator, plus the plumbing to manage beans together
//! and to run jobs on a cron schedule.
//!
//! A bean moves forward through a fixed sequence of phases, and each
//! transition's hook runs at most once. Starting a bean initializes it first,
//! and destroying a bean stops it first.
//!
//! ```rust
//! use femto_frame::lifecycle::{BeanPhase, Lifecycle, LifecycleHooks};
//!
//! #[derive(Default)]
//! struct ConnectionPool {
//!     open: usize,
//! }
//!
//! impl LifecycleHooks for ConnectionPool {
//!     fn do_start(&mut self) -> anyhow::Result<()> {
//!         self.open = 4;
//!         Ok(())
//!     }
//!
//!     fn do_stop(&mut self) -> anyhow::Result<()> {
//!         self.open = 0;
//!         Ok(())
//!     }
//! }
//!
//! let mut pool = Lifecycle::new(ConnectionPool::default());
//! pool.start().unwrap();
//! pool.start().unwrap(); // no-op
//! assert_eq!(BeanPhase::Started, pool.phase());
//! assert_eq!(4, pool.hooks().open);
//!
//! pool.destroy().unwrap(); // stops first
//! assert_eq!(BeanPhase::Destroyed, pool.phase());
//! assert_eq!(0, pool.hooks().open);
//! ```
//!
//! Cron entries compute when something should run next. They never wait.
//!
//! ```rust
//! use femto_frame::cron::CronEntry;
//!
//! // 09:30 on weekdays
//! let entry: CronEntry = "30 9 * * mon-fri".parse().unwrap();
//! // Saturday 2024-01-06 00:00:00 UTC
//! let saturday = 1_704_499_200_000;
//! // Monday 2024-01-08 09:30:00 UTC
//! assert_eq!(1_704_706_200_000, entry.next_running_time(saturday).unwrap());
//! ```
//!
//! Beans are registered in a [`container::BeanContainer`] to be started in
//! order and torn down in reverse, and [`service::ScheduledJobService`]
//! runs a [`service::Job`] at every time a cron entry selects. Wrapped in a
//! [`service::ScheduledTask`], a scheduled service is itself a bean:
//!
//! ```rust
//! use femto_frame::{
//!     container::BeanContainer,
//!     cron::CronEntry,
//!     lifecycle::Lifecycle,
//!     service::{ScheduleConfig, ScheduledJobService, ScheduledTask},
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let report = ScheduledJobService::new(
//!         || println!("nightly report"),
//!         CronEntry::parse("@daily")?,
//!         ScheduleConfig::default(),
//!     )?;
//!
//!     let mut container = BeanContainer::new();
//!     container.register(Lifecycle::named("report", ScheduledTask::new(report)))?;
//!     container.start_all()?;
//!     container.destroy_all()
//! }
//! ```

/// Registers beans and drives them through the lifecycle together.
pub mod container;
/// Cron expression parsing and next-running-time calculation.
pub mod cron;
/// Error types, and logging of errors that are handled rather than returned.
pub mod error;
/// Bean phases and the state machine that runs lifecycle hooks.
pub mod lifecycle;
/// Jobs, services, and running jobs on a cron schedule.
pub mod service;
/// Clock dependencies that are easily swapped out and mocked, to reduce direct dependencies on syscalls.
pub mod time;

/// misc items that are too small to get their own files,
/// kept out of this file to reduce clutter.
mod util;
pub use util::*;
