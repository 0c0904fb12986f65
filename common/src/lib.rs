pub mod config;
pub mod heating;
pub mod report;
pub mod schedule;
pub mod topics;
pub mod trigger;
pub mod types;

pub use config::{ChargerConfig, ClockSource, ConfigError, HeatingCurve, SeasonalFallback};
pub use heating::{tomorrow_average, ForecastError};
pub use schedule::{ChargePlan, ChargingWindow, ScheduledAction, TimeOfDay};
pub use topics::*;
pub use trigger::{DailyTrigger, TriggerAction};
pub use types::{
    ChargeDecision, ChargerStatus, CycleSummary, DecisionSource, ReconcileOutcome, StoredJob,
    SwitchOutcome, TriggerState,
};
