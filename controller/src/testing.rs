//! In-memory collaborators for exercising a decision cycle without a network.

use std::{
    sync::{
        atomic::{AtomicU32, Ordering},
        Mutex,
    },
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::time::Instant;

use nightcharge_common::{ScheduledAction, StoredJob, TimeOfDay};

use crate::traits::{ActionStore, DeviceClock, ForecastSource, LocalTime, Notifier};

pub struct FakeForecast {
    result: Result<Vec<Option<f64>>, String>,
}

impl FakeForecast {
    /// 24 hours of today followed by 24 hours of tomorrow at `tomorrow_c`.
    pub fn steady(today_c: f64, tomorrow_c: f64) -> Self {
        let mut hourly = vec![Some(today_c); 24];
        hourly.extend(std::iter::repeat(Some(tomorrow_c)).take(24));
        Self { result: Ok(hourly) }
    }

    pub fn series(hourly: Vec<Option<f64>>) -> Self {
        Self { result: Ok(hourly) }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            result: Err(reason.to_string()),
        }
    }
}

#[async_trait]
impl ForecastSource for FakeForecast {
    async fn hourly_temperatures(&self) -> Result<Vec<Option<f64>>> {
        self.result.clone().map_err(|reason| anyhow!(reason))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

#[derive(Default)]
pub struct FakeStore {
    pub jobs: Vec<StoredJob>,
    pub fail_list: bool,
    pub fail_delete: bool,
    pub failing_switches: Vec<u32>,
    /// Latency of the list and delete calls, like a slow device.
    pub delay: Duration,
    pub calls: Mutex<Vec<String>>,
    pub next_id: AtomicU32,
}

impl FakeStore {
    pub fn with_jobs(jobs: Vec<StoredJob>) -> Self {
        Self {
            jobs,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn created(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.starts_with("create"))
            .collect()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    async fn respond(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl ActionStore for FakeStore {
    async fn list_jobs(&self) -> Result<Vec<StoredJob>> {
        self.record("list".to_string());
        self.respond().await;
        if self.fail_list {
            return Err(anyhow!("list unavailable"));
        }
        Ok(self.jobs.clone())
    }

    async fn delete_all_jobs(&self) -> Result<()> {
        self.record("delete".to_string());
        self.respond().await;
        if self.fail_delete {
            return Err(anyhow!("delete rejected"));
        }
        Ok(())
    }

    async fn create_job(&self, action: &ScheduledAction) -> Result<u32> {
        self.record(format!(
            "create {} {} {}",
            action.switch_id, action.start, action.duration_secs
        ));
        if self.failing_switches.contains(&action.switch_id) {
            return Err(anyhow!("switch {} offline", action.switch_id));
        }
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn name(&self) -> &str {
        "fake-device"
    }
}

pub struct FakeClock(pub Option<LocalTime>);

impl FakeClock {
    pub fn at(time_of_day: TimeOfDay, month: u32) -> Self {
        Self(Some(LocalTime {
            time_of_day,
            month,
            unix_time: 1_790_000_000,
        }))
    }
}

#[async_trait]
impl DeviceClock for FakeClock {
    async fn now(&self) -> Result<LocalTime> {
        self.0.ok_or_else(|| anyhow!("status query failed"))
    }
}

/// Wall clock that advances with tokio time, so paused tests can cross midnight.
pub struct SteppingClock {
    start_secs: u32,
    origin: Instant,
}

impl SteppingClock {
    pub fn starting_at(time_of_day: TimeOfDay) -> Self {
        Self {
            start_secs: time_of_day.seconds(),
            origin: Instant::now(),
        }
    }
}

#[async_trait]
impl DeviceClock for SteppingClock {
    async fn now(&self) -> Result<LocalTime> {
        let elapsed = self.origin.elapsed().as_secs();
        let seconds = (u64::from(self.start_secs) + elapsed) % 86_400;
        Ok(LocalTime {
            time_of_day: TimeOfDay::from_seconds(seconds as u32),
            month: 1,
            unix_time: 1_790_000_000 + elapsed as i64,
        })
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub fail: bool,
    pub messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &str) -> Result<()> {
        self.messages.lock().unwrap().push(message.to_string());
        if self.fail {
            return Err(anyhow!("gateway down"));
        }
        Ok(())
    }
}
