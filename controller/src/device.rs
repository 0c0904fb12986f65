use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono_tz::Tz;
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use nightcharge_common::{ScheduledAction, StoredJob, TimeOfDay};

use crate::{
    clock::month_of,
    traits::{ActionStore, DeviceClock, LocalTime},
};

const EVERY_DAY: &str = "SUN,MON,TUE,WED,THU,FRI,SAT";

/// Shelly Gen2 RPC over plain HTTP.
#[derive(Debug, Clone)]
pub struct ShellyClient {
    client: Client,
    base_url: String,
    timezone: Tz,
}

#[derive(Debug, Deserialize)]
struct ScheduleListResponse {
    #[serde(default)]
    jobs: Vec<ShellyJob>,
}

#[derive(Debug, Deserialize)]
struct ShellyJob {
    id: u32,
    #[serde(default)]
    enable: bool,
    #[serde(default)]
    timespec: String,
}

#[derive(Debug, Deserialize)]
struct ScheduleCreateResponse {
    id: u32,
}

#[derive(Debug, Deserialize)]
struct SysStatus {
    time: Option<String>,
    unixtime: Option<i64>,
}

#[derive(Debug, Serialize)]
struct ScheduleCreateRequest {
    enable: bool,
    timespec: String,
    calls: Vec<ScheduleCall>,
}

#[derive(Debug, Serialize)]
struct ScheduleCall {
    method: &'static str,
    params: SwitchSetParams,
}

#[derive(Debug, Serialize)]
struct SwitchSetParams {
    id: u32,
    on: bool,
    toggle_after: u32,
}

impl ShellyClient {
    pub fn new(client: Client, host: &str, timezone: Tz) -> Self {
        let base_url = if host.starts_with("http://") || host.starts_with("https://") {
            host.trim_end_matches('/').to_string()
        } else {
            format!("http://{host}")
        };

        Self {
            client,
            base_url,
            timezone,
        }
    }

    async fn rpc_get<T: DeserializeOwned>(&self, method: &str) -> Result<T> {
        let url = format!("{}/rpc/{method}", self.base_url);
        debug!("device rpc GET {url}");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("{method} request failed"))?;
        decode_rpc(method, response).await
    }

    async fn rpc_post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<T> {
        let url = format!("{}/rpc/{method}", self.base_url);
        debug!("device rpc POST {url}");
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("{method} request failed"))?;
        decode_rpc(method, response).await
    }
}

async fn decode_rpc<T: DeserializeOwned>(method: &str, response: Response) -> Result<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .with_context(|| format!("{method} response body unreadable"))?;

    if !status.is_success() {
        bail!("{method} returned HTTP {status}: {}", body.trim());
    }

    serde_json::from_str(&body).with_context(|| format!("{method} returned malformed JSON"))
}

/// Cron-style expression the device evaluates every day: `ss mm hh DOM MON DOW`.
pub fn daily_timespec(start: TimeOfDay) -> String {
    format!(
        "{} {} {} * * {EVERY_DAY}",
        start.second(),
        start.minute(),
        start.hour()
    )
}

fn create_request(action: &ScheduledAction) -> ScheduleCreateRequest {
    ScheduleCreateRequest {
        enable: true,
        timespec: daily_timespec(action.start),
        calls: vec![ScheduleCall {
            method: "Switch.Set",
            params: SwitchSetParams {
                id: action.switch_id,
                on: true,
                toggle_after: action.duration_secs,
            },
        }],
    }
}

#[async_trait]
impl ActionStore for ShellyClient {
    async fn list_jobs(&self) -> Result<Vec<StoredJob>> {
        let listed: ScheduleListResponse = self.rpc_get("Schedule.List").await?;
        Ok(listed
            .jobs
            .into_iter()
            .map(|job| StoredJob {
                id: job.id,
                enable: job.enable,
                timespec: job.timespec,
            })
            .collect())
    }

    async fn delete_all_jobs(&self) -> Result<()> {
        let _: serde_json::Value = self.rpc_get("Schedule.DeleteAll").await?;
        Ok(())
    }

    async fn create_job(&self, action: &ScheduledAction) -> Result<u32> {
        let created: ScheduleCreateResponse = self
            .rpc_post("Schedule.Create", &create_request(action))
            .await?;
        Ok(created.id)
    }

    fn name(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl DeviceClock for ShellyClient {
    async fn now(&self) -> Result<LocalTime> {
        let status: SysStatus = self.rpc_get("Sys.GetStatus").await?;

        let time = status
            .time
            .ok_or_else(|| anyhow!("device clock is not synchronised"))?;
        let time_of_day = TimeOfDay::parse(&time)
            .with_context(|| format!("device reported unusable time '{time}'"))?;
        let unix_time = status
            .unixtime
            .ok_or_else(|| anyhow!("device did not report unixtime"))?;
        let month = month_of(unix_time, self.timezone)
            .ok_or_else(|| anyhow!("device unixtime {unix_time} out of range"))?;

        Ok(LocalTime {
            time_of_day,
            month,
            unix_time,
        })
    }
}
