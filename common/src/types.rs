use serde::{Deserialize, Serialize};

use crate::schedule::{ChargePlan, ChargingWindow, TimeOfDay};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DecisionSource {
    Forecast,
    Fallback,
}

impl DecisionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Forecast => "FORECAST",
            Self::Fallback => "FALLBACK",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerState {
    Idle,
    RanToday,
}

impl TriggerState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::RanToday => "RAN_TODAY",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChargeDecision {
    #[serde(rename = "durationSecs")]
    pub duration_secs: u32,
    /// Only known when the forecast path succeeded.
    #[serde(rename = "averageTempC")]
    pub average_temp_c: Option<f64>,
    pub source: DecisionSource,
}

/// A timed job as the relay device reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredJob {
    pub id: u32,
    pub enable: bool,
    pub timespec: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwitchOutcome {
    #[serde(rename = "switchId")]
    pub switch_id: u32,
    #[serde(rename = "jobId")]
    pub job_id: Option<u32>,
    pub error: Option<String>,
}

impl SwitchOutcome {
    pub fn created(switch_id: u32, job_id: u32) -> Self {
        Self {
            switch_id,
            job_id: Some(job_id),
            error: None,
        }
    }

    pub fn failed(switch_id: u32, error: impl Into<String>) -> Self {
        Self {
            switch_id,
            job_id: None,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReconcileOutcome {
    ListFailed {
        error: String,
    },
    DeleteFailed {
        error: String,
    },
    NothingToSchedule {
        removed: usize,
    },
    Applied {
        removed: usize,
        switches: Vec<SwitchOutcome>,
    },
}

impl ReconcileOutcome {
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::ListFailed { .. } | Self::DeleteFailed { .. })
    }

    pub fn failed_switches(&self) -> usize {
        match self {
            Self::Applied { switches, .. } => switches.iter().filter(|s| !s.is_ok()).count(),
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleSummary {
    #[serde(rename = "startedEpoch")]
    pub started_epoch: i64,
    pub decision: ChargeDecision,
    pub plan: ChargePlan,
    pub outcome: ReconcileOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChargerStatus {
    #[serde(rename = "triggerState")]
    pub trigger_state: &'static str,
    #[serde(rename = "hasRunToday")]
    pub has_run_today: bool,
    #[serde(rename = "testMode")]
    pub test_mode: bool,
    #[serde(rename = "fetchTime")]
    pub fetch_time: TimeOfDay,
    pub window: ChargingWindow,
    #[serde(rename = "switchIds")]
    pub switch_ids: Vec<u32>,
    pub timezone: String,
    #[serde(rename = "cycleRunning")]
    pub cycle_running: bool,
    #[serde(rename = "cyclesRun")]
    pub cycles_run: u64,
    #[serde(rename = "lastCycle")]
    pub last_cycle: Option<CycleSummary>,
}
