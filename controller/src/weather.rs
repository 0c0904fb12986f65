use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::traits::ForecastSource;

const FORECAST_DAYS: u32 = 2;

#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    client: Client,
    api_base: String,
    latitude: f64,
    longitude: f64,
    timezone: String,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    hourly: HourlyBlock,
}

#[derive(Debug, Deserialize)]
struct HourlyBlock {
    temperature_2m: Vec<Option<f64>>,
}

impl OpenMeteoClient {
    pub fn new(
        client: Client,
        api_base: &str,
        latitude: f64,
        longitude: f64,
        timezone: &str,
    ) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            latitude,
            longitude,
            timezone: timezone.to_string(),
        }
    }

    fn forecast_url(&self) -> String {
        format!(
            "{}/v1/forecast?latitude={}&longitude={}&hourly=temperature_2m&timezone={}&forecast_days={FORECAST_DAYS}",
            self.api_base,
            self.latitude,
            self.longitude,
            urlencoding::encode(&self.timezone)
        )
    }
}

#[async_trait]
impl ForecastSource for OpenMeteoClient {
    async fn hourly_temperatures(&self) -> Result<Vec<Option<f64>>> {
        let url = self.forecast_url();
        debug!("fetching forecast from {url}");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("forecast request failed")?;

        let status = response.status();
        if status != StatusCode::OK {
            bail!("forecast provider returned HTTP {status}");
        }

        let body = response
            .text()
            .await
            .context("forecast response body unreadable")?;
        let parsed: ForecastResponse =
            serde_json::from_str(&body).context("malformed forecast response")?;

        Ok(parsed.hourly.temperature_2m)
    }

    fn name(&self) -> &str {
        "open-meteo"
    }
}
