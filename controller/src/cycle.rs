use tracing::{info, warn};

use nightcharge_common::{
    report::{decision_message, forecast_failure_message},
    tomorrow_average, ChargeDecision, ChargerConfig, CycleSummary,
};

use crate::{
    reconcile::{notify, reconcile},
    traits::{ActionStore, DeviceClock, ForecastSource, Notifier},
};

/// Month assumed when the clock cannot be read.
const FALLBACK_MONTH: u32 = 1;

/// Collaborators for one decision cycle.
pub struct CycleContext<'a> {
    pub config: &'a ChargerConfig,
    pub forecast: &'a dyn ForecastSource,
    pub store: &'a dyn ActionStore,
    pub clock: &'a dyn DeviceClock,
    pub notifier: &'a dyn Notifier,
}

/// Fetch, decide, plan and reconcile, strictly in that order.
pub async fn run_decision_cycle(ctx: &CycleContext<'_>) -> CycleSummary {
    let started = ctx.clock.now().await.ok();
    let decision = decide(ctx, started.map(|now| now.month)).await;

    let window = &ctx.config.window;
    let plan = window.plan_backward(decision.duration_secs);
    info!(
        "decision {}: {}s required, plan {}s from {} (window {window}{})",
        decision.source.as_str(),
        decision.duration_secs,
        plan.duration_secs,
        plan.start,
        if plan.clamped { ", clamped" } else { "" }
    );
    notify(ctx.notifier, &decision_message(&decision, &plan, window)).await;

    let outcome = reconcile(ctx.store, ctx.notifier, &plan, &ctx.config.device.switch_ids).await;

    CycleSummary {
        started_epoch: started.map(|now| now.unix_time).unwrap_or_default(),
        decision,
        plan,
        outcome,
    }
}

async fn decide(ctx: &CycleContext<'_>, month: Option<u32>) -> ChargeDecision {
    let failure = match ctx.forecast.hourly_temperatures().await {
        Ok(hourly) => match tomorrow_average(&hourly) {
            Ok(average) => {
                info!("{} average for tomorrow: {average:.2} C", ctx.forecast.name());
                return ctx.config.heating_curve.decide(average);
            }
            Err(err) => err.to_string(),
        },
        Err(err) => format!("{err:#}"),
    };

    let month = month.unwrap_or_else(|| {
        warn!("clock unavailable, assuming month {FALLBACK_MONTH}");
        FALLBACK_MONTH
    });
    warn!(
        "forecast from {} unusable ({failure}); seasonal fallback for month {month}",
        ctx.forecast.name()
    );
    notify(ctx.notifier, &forecast_failure_message(&failure, month)).await;

    ctx.config.fallback.decide(month)
}
