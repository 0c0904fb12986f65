use anyhow::Result;
use async_trait::async_trait;

use nightcharge_common::{ScheduledAction, StoredJob, TimeOfDay};

/// Local wall-clock reading as seen by whichever clock drives the trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalTime {
    pub time_of_day: TimeOfDay,
    /// Calendar month 1..=12 in the configured timezone.
    pub month: u32,
    pub unix_time: i64,
}

#[async_trait]
pub trait ForecastSource: Send + Sync {
    /// Hourly temperatures for today and tomorrow, local timezone, index 0 at
    /// today's midnight. Missing hours come back as `None`.
    async fn hourly_temperatures(&self) -> Result<Vec<Option<f64>>>;

    fn name(&self) -> &str;
}

/// The relay device's stored timed jobs.
#[async_trait]
pub trait ActionStore: Send + Sync {
    async fn list_jobs(&self) -> Result<Vec<StoredJob>>;

    async fn delete_all_jobs(&self) -> Result<()>;

    /// Returns the id the device assigned to the new job.
    async fn create_job(&self, action: &ScheduledAction) -> Result<u32>;

    fn name(&self) -> &str;
}

#[async_trait]
pub trait DeviceClock: Send + Sync {
    async fn now(&self) -> Result<LocalTime>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str) -> Result<()>;
}
