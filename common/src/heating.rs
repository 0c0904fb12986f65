use thiserror::Error;

use crate::{
    config::{HeatingCurve, SeasonalFallback},
    types::{ChargeDecision, DecisionSource},
};

/// Hourly samples of a two-day forecast; tomorrow starts at this index.
pub const TOMORROW_OFFSET: usize = 24;
pub const HOURS_PER_DAY: usize = 24;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForecastError {
    #[error("forecast has {available} usable hourly values for tomorrow, need 24")]
    TooFewSamples { available: usize },
}

impl HeatingCurve {
    pub fn duration_hours(&self, average_temp_c: f64) -> f64 {
        let hours = (self.start_temp_c - average_temp_c) * self.hours_per_degree;
        hours.max(0.0).min(self.max_runtime_hours)
    }

    pub fn decide(&self, average_temp_c: f64) -> ChargeDecision {
        ChargeDecision {
            duration_secs: hours_to_secs(self.duration_hours(average_temp_c)),
            average_temp_c: Some(average_temp_c),
            source: DecisionSource::Forecast,
        }
    }
}

impl SeasonalFallback {
    /// Quarter lookup; anything outside 1..=12 is treated as January.
    pub fn duration_hours(&self, month: u32) -> f64 {
        match month {
            4..=6 => self.q2_hours,
            7..=9 => self.q3_hours,
            10..=12 => self.q4_hours,
            _ => self.q1_hours,
        }
    }

    pub fn decide(&self, month: u32) -> ChargeDecision {
        ChargeDecision {
            duration_secs: hours_to_secs(self.duration_hours(month)),
            average_temp_c: None,
            source: DecisionSource::Fallback,
        }
    }
}

/// Mean of tomorrow's 24 hourly values out of a 48-hour series.
///
/// Missing (`None`) or non-finite entries do not count; fewer than 24 usable
/// values means the forecast is unusable.
pub fn tomorrow_average(hourly: &[Option<f64>]) -> Result<f64, ForecastError> {
    let tomorrow: Vec<f64> = hourly
        .iter()
        .skip(TOMORROW_OFFSET)
        .take(HOURS_PER_DAY)
        .filter_map(|value| value.filter(|temp| temp.is_finite()))
        .collect();

    if tomorrow.len() < HOURS_PER_DAY {
        return Err(ForecastError::TooFewSamples {
            available: tomorrow.len(),
        });
    }

    Ok(tomorrow.iter().sum::<f64>() / tomorrow.len() as f64)
}

pub fn hours_to_secs(hours: f64) -> u32 {
    if !hours.is_finite() || hours <= 0.0 {
        return 0;
    }
    (hours * 3600.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve() -> HeatingCurve {
        HeatingCurve {
            start_temp_c: 15.0,
            hours_per_degree: 0.5,
            max_runtime_hours: 8.0,
        }
    }

    #[test]
    fn warm_forecast_needs_no_charge() {
        let curve = curve();
        for temp in [15.0, 15.1, 22.0, 40.0] {
            assert_eq!(curve.duration_hours(temp), 0.0);
        }
        assert_eq!(curve.decide(18.0).duration_secs, 0);
    }

    #[test]
    fn cold_forecast_follows_the_curve() {
        let curve = curve();
        assert_eq!(curve.duration_hours(11.0), 2.0);
        assert_eq!(curve.duration_hours(5.0), 5.0);

        let decision = curve.decide(9.5);
        assert_eq!(decision.duration_secs, 9_900);
        assert_eq!(decision.average_temp_c, Some(9.5));
        assert_eq!(decision.source, DecisionSource::Forecast);
    }

    #[test]
    fn duration_is_capped_at_max_runtime() {
        let curve = curve();
        assert_eq!(curve.duration_hours(-1.0), 8.0);
        assert_eq!(curve.duration_hours(-20.0), 8.0);
    }

    #[test]
    fn duration_never_increases_with_temperature() {
        let curve = curve();
        let mut previous = f64::MAX;
        for step in -60..=60 {
            let hours = curve.duration_hours(f64::from(step) * 0.5);
            assert!(hours >= 0.0);
            assert!(hours <= previous);
            previous = hours;
        }
    }

    #[test]
    fn fallback_partitions_months_by_quarter() {
        let fallback = SeasonalFallback {
            q1_hours: 1.0,
            q2_hours: 2.0,
            q3_hours: 3.0,
            q4_hours: 4.0,
        };

        let by_month: Vec<f64> = (1..=12).map(|m| fallback.duration_hours(m)).collect();
        assert_eq!(
            by_month,
            vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 3.0, 3.0, 3.0, 4.0, 4.0, 4.0]
        );

        let decision = fallback.decide(11);
        assert_eq!(decision.duration_secs, 4 * 3600);
        assert_eq!(decision.average_temp_c, None);
        assert_eq!(decision.source, DecisionSource::Fallback);
    }

    #[test]
    fn averages_only_tomorrow() {
        let mut hourly = vec![Some(100.0); TOMORROW_OFFSET];
        hourly.extend((0..24).map(|hour| Some(f64::from(hour))));

        assert_eq!(tomorrow_average(&hourly), Ok(11.5));
    }

    #[test]
    fn short_or_gappy_forecast_is_rejected() {
        let short = vec![Some(5.0); 40];
        assert_eq!(
            tomorrow_average(&short),
            Err(ForecastError::TooFewSamples { available: 16 })
        );

        let mut gappy = vec![Some(5.0); 48];
        gappy[30] = None;
        gappy[31] = Some(f64::NAN);
        assert_eq!(
            tomorrow_average(&gappy),
            Err(ForecastError::TooFewSamples { available: 22 })
        );

        assert!(tomorrow_average(&[]).is_err());
    }

    #[test]
    fn hours_convert_to_whole_seconds() {
        assert_eq!(hours_to_secs(0.0), 0);
        assert_eq!(hours_to_secs(-2.0), 0);
        assert_eq!(hours_to_secs(f64::NAN), 0);
        assert_eq!(hours_to_secs(1.5), 5_400);
        assert_eq!(hours_to_secs(0.0001), 0);
    }
}
