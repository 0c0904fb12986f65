use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schedule::{ChargingWindow, TimeOfDay};

/// The daily trigger re-arms at this minute, so the fetch time must differ.
pub const TRIGGER_RESET_TIME: TimeOfDay = TimeOfDay::from_hm(0, 1);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid time of day '{0}', expected HH:MM")]
    InvalidTimeOfDay(String),
    #[error("at least one switch id is required")]
    NoSwitches,
    #[error("device host is empty")]
    MissingDeviceHost,
    #[error("fetch time {0} collides with the daily trigger reset at 00:01")]
    FetchTimeCollidesWithReset(TimeOfDay),
    #[error("telegram notifications are enabled but bot token or chat id is missing")]
    IncompleteNotificationTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClockSource {
    /// Host clock converted into the configured timezone.
    #[default]
    Host,
    /// Ask the relay device for its local time.
    Device,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Relay address. No default: `validate` rejects it until configured.
    pub host: String,
    #[serde(rename = "switchIds")]
    pub switch_ids: Vec<u32>,
    pub clock: ClockSource,
    #[serde(rename = "requestTimeoutSecs")]
    pub request_timeout_secs: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            switch_ids: vec![0],
            clock: ClockSource::Host,
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    #[serde(rename = "apiBase")]
    pub api_base: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.open-meteo.com".to_string(),
            latitude: 48.137,
            longitude: 11.575,
        }
    }
}

/// Linear mapping from tomorrow's mean temperature to charge hours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatingCurve {
    #[serde(rename = "startTempC")]
    pub start_temp_c: f64,
    #[serde(rename = "hoursPerDegree")]
    pub hours_per_degree: f64,
    #[serde(rename = "maxRuntimeHours")]
    pub max_runtime_hours: f64,
}

impl Default for HeatingCurve {
    fn default() -> Self {
        Self {
            start_temp_c: 15.0,
            hours_per_degree: 0.5,
            max_runtime_hours: 8.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonalFallback {
    #[serde(rename = "q1Hours")]
    pub q1_hours: f64,
    #[serde(rename = "q2Hours")]
    pub q2_hours: f64,
    #[serde(rename = "q3Hours")]
    pub q3_hours: f64,
    #[serde(rename = "q4Hours")]
    pub q4_hours: f64,
}

impl Default for SeasonalFallback {
    fn default() -> Self {
        Self {
            q1_hours: 7.0,
            q2_hours: 3.0,
            q3_hours: 0.0,
            q4_hours: 6.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
    #[serde(rename = "apiBase")]
    pub api_base: String,
    #[serde(rename = "botToken")]
    pub bot_token: String,
    #[serde(rename = "chatId")]
    pub chat_id: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_base: "https://api.telegram.org".to_string(),
            bot_token: String::new(),
            chat_id: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    #[serde(rename = "fetchTime")]
    pub fetch_time: TimeOfDay,
    #[serde(rename = "tickIntervalSecs")]
    pub tick_interval_secs: u64,
    pub timezone: String,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            fetch_time: TimeOfDay::from_hm(18, 0),
            tick_interval_secs: 60,
            timezone: "Europe/Berlin".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TestModeConfig {
    pub enabled: bool,
    #[serde(rename = "intervalSecs")]
    pub interval_secs: u64,
}

impl Default for TestModeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Empty disables MQTT.
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    #[serde(rename = "statusIntervalSecs")]
    pub status_interval_secs: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 1883,
            user: String::new(),
            pass: String::new(),
            status_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChargerConfig {
    pub device: DeviceConfig,
    pub window: ChargingWindow,
    pub forecast: ForecastConfig,
    #[serde(rename = "heatingCurve")]
    pub heating_curve: HeatingCurve,
    pub fallback: SeasonalFallback,
    pub notification: NotificationConfig,
    pub trigger: TriggerConfig,
    #[serde(rename = "testMode")]
    pub test_mode: TestModeConfig,
    pub mqtt: MqttConfig,
}

impl Default for ChargerConfig {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            window: ChargingWindow::default(),
            forecast: ForecastConfig::default(),
            heating_curve: HeatingCurve::default(),
            fallback: SeasonalFallback::default(),
            notification: NotificationConfig::default(),
            trigger: TriggerConfig::default(),
            test_mode: TestModeConfig::default(),
            mqtt: MqttConfig::default(),
        }
    }
}

impl Default for ChargingWindow {
    fn default() -> Self {
        Self {
            start: TimeOfDay::from_hm(22, 0),
            end: TimeOfDay::from_hm(6, 0),
        }
    }
}

impl HeatingCurve {
    pub fn sanitize(&mut self) {
        if !self.start_temp_c.is_finite() {
            self.start_temp_c = Self::default().start_temp_c;
        }
        if !self.hours_per_degree.is_finite() || self.hours_per_degree < 0.0 {
            self.hours_per_degree = 0.0;
        }
        self.max_runtime_hours = sanitize_hours(self.max_runtime_hours);
    }
}

impl SeasonalFallback {
    pub fn sanitize(&mut self) {
        self.q1_hours = sanitize_hours(self.q1_hours);
        self.q2_hours = sanitize_hours(self.q2_hours);
        self.q3_hours = sanitize_hours(self.q3_hours);
        self.q4_hours = sanitize_hours(self.q4_hours);
    }
}

impl ChargerConfig {
    pub fn sanitize(&mut self) {
        let mut seen = Vec::with_capacity(self.device.switch_ids.len());
        self.device.switch_ids.retain(|id| {
            if seen.contains(id) {
                false
            } else {
                seen.push(*id);
                true
            }
        });
        self.device.host = self.device.host.trim().to_string();
        self.device.request_timeout_secs = self.device.request_timeout_secs.clamp(1, 120);

        self.forecast.latitude = self.forecast.latitude.clamp(-90.0, 90.0);
        self.forecast.longitude = self.forecast.longitude.clamp(-180.0, 180.0);

        self.heating_curve.sanitize();
        self.fallback.sanitize();

        self.trigger.tick_interval_secs = self.trigger.tick_interval_secs.clamp(1, 60);
        self.test_mode.interval_secs = self.test_mode.interval_secs.max(10);
        self.mqtt.status_interval_secs = self.mqtt.status_interval_secs.max(5);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device.switch_ids.is_empty() {
            return Err(ConfigError::NoSwitches);
        }
        if self.device.host.is_empty() {
            return Err(ConfigError::MissingDeviceHost);
        }
        if self.trigger.fetch_time.minute_of_day() == TRIGGER_RESET_TIME.minute_of_day() {
            return Err(ConfigError::FetchTimeCollidesWithReset(
                self.trigger.fetch_time,
            ));
        }
        if self.notification.enabled
            && (self.notification.bot_token.trim().is_empty()
                || self.notification.chat_id.trim().is_empty())
        {
            return Err(ConfigError::IncompleteNotificationTarget);
        }
        Ok(())
    }
}

fn sanitize_hours(hours: f64) -> f64 {
    if hours.is_finite() {
        hours.clamp(0.0, 24.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let raw = r#"{
            "device": { "host": "10.0.0.7", "switchIds": [1, 2] },
            "window": { "start": "23:00", "end": "07:00" },
            "trigger": { "fetchTime": "17:30" }
        }"#;
        let config: ChargerConfig = serde_json::from_str(raw).unwrap();

        assert_eq!(config.device.host, "10.0.0.7");
        assert_eq!(config.device.switch_ids, vec![1, 2]);
        assert_eq!(config.device.clock, ClockSource::Host);
        assert_eq!(config.window.start.to_string(), "23:00");
        assert_eq!(config.trigger.fetch_time.to_string(), "17:30");
        assert_eq!(config.trigger.timezone, "Europe/Berlin");
        assert_eq!(config.heating_curve, HeatingCurve::default());
        assert!(!config.test_mode.enabled);
    }

    #[test]
    fn rejects_malformed_window_time() {
        let raw = r#"{ "window": { "start": "22h", "end": "06:00" } }"#;
        assert!(serde_json::from_str::<ChargerConfig>(raw).is_err());
    }

    #[test]
    fn sanitize_dedups_switches_and_clamps_ranges() {
        let mut config = ChargerConfig::default();
        config.device.switch_ids = vec![2, 0, 2, 1, 0];
        config.heating_curve.hours_per_degree = -1.0;
        config.heating_curve.max_runtime_hours = 30.0;
        config.fallback.q2_hours = f64::NAN;
        config.trigger.tick_interval_secs = 0;

        config.sanitize();

        assert_eq!(config.device.switch_ids, vec![2, 0, 1]);
        assert_eq!(config.heating_curve.hours_per_degree, 0.0);
        assert_eq!(config.heating_curve.max_runtime_hours, 24.0);
        assert_eq!(config.fallback.q2_hours, 0.0);
        assert_eq!(config.trigger.tick_interval_secs, 1);
    }

    #[test]
    fn default_config_needs_a_device_host() {
        let mut config = ChargerConfig::default();
        assert_eq!(config.validate(), Err(ConfigError::MissingDeviceHost));

        config.device.host = "10.0.0.7".to_string();
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn validate_reports_unusable_settings() {
        let mut config = ChargerConfig::default();
        config.device.switch_ids.clear();
        assert_eq!(config.validate(), Err(ConfigError::NoSwitches));

        let mut config = ChargerConfig::default();
        config.device.host = "10.0.0.7".to_string();
        config.trigger.fetch_time = TRIGGER_RESET_TIME;
        assert_eq!(
            config.validate(),
            Err(ConfigError::FetchTimeCollidesWithReset(TRIGGER_RESET_TIME))
        );

        let mut config = ChargerConfig::default();
        config.device.host = "10.0.0.7".to_string();
        config.notification.enabled = true;
        config.notification.bot_token = "123:abc".to_string();
        assert_eq!(
            config.validate(),
            Err(ConfigError::IncompleteNotificationTarget)
        );
    }
}
