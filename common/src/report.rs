use std::fmt::Write;

use crate::{
    schedule::{ChargePlan, ChargingWindow},
    types::{ChargeDecision, DecisionSource, ReconcileOutcome, StoredJob, SwitchOutcome},
};

pub fn format_hours(secs: u32) -> String {
    format!("{:.2}h", f64::from(secs) / 3600.0)
}

pub fn decision_message(
    decision: &ChargeDecision,
    plan: &ChargePlan,
    window: &ChargingWindow,
) -> String {
    let mut message = String::from("Night charge decision\n");

    match (decision.source, decision.average_temp_c) {
        (DecisionSource::Forecast, Some(temp)) => {
            let _ = writeln!(message, "Forecast avg. tomorrow: {temp:.1} C");
        }
        _ => {
            let _ = writeln!(message, "Source: seasonal fallback");
        }
    }

    let _ = writeln!(
        message,
        "Required: {}",
        format_hours(decision.duration_secs)
    );

    if plan.is_idle() {
        let _ = write!(message, "No charge needed in window {window}");
    } else {
        let _ = write!(
            message,
            "Plan: {} from {} to {} (window {window})",
            format_hours(plan.duration_secs),
            plan.start,
            plan.end()
        );
        if plan.clamped {
            message.push_str("\nClamped to the charging window");
        }
    }

    message
}

pub fn forecast_failure_message(reason: &str, month: u32) -> String {
    format!("Forecast unavailable: {reason}\nUsing seasonal fallback for month {month}")
}

pub fn existing_jobs_message(jobs: &[StoredJob]) -> String {
    if jobs.is_empty() {
        return "No stored schedules on device".to_string();
    }

    let mut message = format!("Replacing {} stored schedule(s):", jobs.len());
    for job in jobs {
        let _ = write!(
            message,
            "\n#{} {} [{}]",
            job.id,
            job.timespec,
            if job.enable { "on" } else { "off" }
        );
    }
    message
}

pub fn switch_message(outcome: &SwitchOutcome, plan: &ChargePlan) -> String {
    match (&outcome.job_id, &outcome.error) {
        (_, Some(error)) => format!(
            "Switch {}: schedule creation failed: {error}",
            outcome.switch_id
        ),
        (Some(job_id), None) => format!(
            "Switch {}: on at {} for {} (job #{job_id})",
            outcome.switch_id,
            plan.start,
            format_hours(plan.duration_secs)
        ),
        (None, None) => format!("Switch {}: no job created", outcome.switch_id),
    }
}

pub fn outcome_message(outcome: &ReconcileOutcome) -> String {
    match outcome {
        ReconcileOutcome::ListFailed { error } => {
            format!("Cycle aborted: could not read stored schedules: {error}")
        }
        ReconcileOutcome::DeleteFailed { error } => {
            format!("Cycle aborted: could not delete stored schedules: {error}")
        }
        ReconcileOutcome::NothingToSchedule { removed } => {
            format!("Removed {removed} schedule(s); no charge scheduled")
        }
        ReconcileOutcome::Applied { removed, switches } => {
            let ok = switches.iter().filter(|s| s.is_ok()).count();
            format!(
                "Removed {removed} schedule(s); {ok}/{} switch(es) scheduled",
                switches.len()
            )
        }
    }
}
