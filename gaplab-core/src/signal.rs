//! Gap-up signal detection.
//!
//! A day signals when both stages hold:
//! 1. Gap-up: the session open is at least `gap_threshold` above the prior
//!    session's close.
//! 2. Confirmation: the bar at exactly `confirmation_time` closes above the
//!    session open.
//!
//! A missing confirmation bar is a permanent skip for the day. The detector
//! never looks at a nearby bar instead.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::aggregate::{DailyAggregates, DayStepping};
use crate::domain::session::time_of_day;
use crate::error::{CoreError, Evaluation, SkipReason};
use crate::series::TimeSeries;

/// Parameters for the two confirmation stages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalParams {
    #[serde(with = "time_of_day")]
    pub confirmation_time: NaiveTime,
    /// Minimum gap as a fraction (0.005 = 0.5%).
    pub gap_threshold: f64,
    pub day_stepping: DayStepping,
}

impl Default for SignalParams {
    fn default() -> Self {
        Self {
            confirmation_time: NaiveTime::from_hms_opt(11, 15, 0).unwrap_or(NaiveTime::MIN),
            gap_threshold: 0.005,
            day_stepping: DayStepping::CalendarDay,
        }
    }
}

/// A confirmed entry opportunity for one day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    pub day: NaiveDate,
    /// Close of the confirmation bar.
    pub signal_price: f64,
    pub confirmation_timestamp: NaiveDateTime,
    pub day_open: f64,
    pub prior_close: f64,
}

/// Run both stages for `day`, reporting why a day was skipped.
pub fn detect(
    day: NaiveDate,
    aggregates: &DailyAggregates,
    series: &TimeSeries,
    params: &SignalParams,
) -> Result<Evaluation<SignalEvent>, CoreError> {
    let Some(today) = aggregates.get(day) else {
        return Ok(Evaluation::Skipped(SkipReason::NoSessionOpen));
    };
    let Some(prior) = aggregates.prior(day, params.day_stepping) else {
        return Ok(Evaluation::Skipped(SkipReason::NoPriorSession));
    };
    if prior.date >= day {
        return Err(CoreError::PriorSessionNotBefore {
            day,
            prior: prior.date,
        });
    }

    if today.open < prior.close * (1.0 + params.gap_threshold) {
        return Ok(Evaluation::Skipped(SkipReason::GapTooSmall));
    }

    let confirmation_timestamp = day.and_time(params.confirmation_time);
    let Some(confirmation) = series.get(confirmation_timestamp) else {
        tracing::debug!(%day, %confirmation_timestamp, "no confirmation bar, skipping day");
        return Ok(Evaluation::Skipped(SkipReason::MissingConfirmationBar));
    };

    let signal_price = confirmation.close;
    if signal_price <= today.open {
        return Ok(Evaluation::Skipped(SkipReason::NotConfirmed));
    }

    Ok(Evaluation::Hit(SignalEvent {
        day,
        signal_price,
        confirmation_timestamp,
        day_open: today.open,
        prior_close: prior.close,
    }))
}

/// Signal for `day`, or `None` when either stage fails or data is missing.
pub fn find_signal(
    day: NaiveDate,
    aggregates: &DailyAggregates,
    series: &TimeSeries,
    params: &SignalParams,
) -> Result<Option<SignalEvent>, CoreError> {
    detect(day, aggregates, series, params).map(Evaluation::into_option)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::DailyAggregate;
    use crate::domain::{Bar, SessionWindow};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn bar(day: u32, h: u32, m: u32, open: f64, close: f64) -> Bar {
        Bar {
            timestamp: date(day).and_hms_opt(h, m, 0).unwrap(),
            open,
            high: open.max(close),
            low: open.min(close),
            close,
            volume: 10,
        }
    }

    /// Tue 2024-01-02 closes at 100; Wed 2024-01-03 opens at `open` and the
    /// 11:15 bar closes at `confirm_close`.
    fn two_day_series(open: f64, confirm_close: Option<f64>) -> TimeSeries {
        let mut bars = vec![
            bar(2, 9, 30, 99.0, 99.5),
            bar(2, 16, 0, 99.8, 100.0),
            bar(3, 9, 30, open, open),
        ];
        if let Some(close) = confirm_close {
            bars.push(bar(3, 11, 15, open, close));
        }
        bars.push(bar(3, 16, 0, open, open));
        TimeSeries::new("TEST", bars).unwrap()
    }

    fn run(series: &TimeSeries, params: &SignalParams) -> Evaluation<SignalEvent> {
        let aggs = DailyAggregates::build(series, &SessionWindow::regular_hours());
        detect(date(3), &aggs, series, params).unwrap()
    }

    #[test]
    fn gap_at_threshold_passes() {
        // 100.6 >= 100 * 1.005
        let series = two_day_series(100.6, Some(101.0));
        let Evaluation::Hit(signal) = run(&series, &SignalParams::default()) else {
            panic!("expected signal");
        };
        assert_eq!(signal.signal_price, 101.0);
        assert_eq!(signal.day_open, 100.6);
        assert_eq!(signal.prior_close, 100.0);
        assert_eq!(signal.confirmation_timestamp, date(3).and_hms_opt(11, 15, 0).unwrap());
    }

    #[test]
    fn gap_below_threshold_is_gated() {
        let series = two_day_series(100.4, Some(101.0));
        assert_eq!(
            run(&series, &SignalParams::default()),
            Evaluation::Skipped(SkipReason::GapTooSmall)
        );
    }

    #[test]
    fn missing_confirmation_bar_skips_day() {
        let series = two_day_series(100.6, None);
        assert_eq!(
            run(&series, &SignalParams::default()),
            Evaluation::Skipped(SkipReason::MissingConfirmationBar)
        );
    }

    #[test]
    fn confirmation_must_exceed_open_strictly() {
        let series = two_day_series(100.6, Some(100.6));
        assert_eq!(
            run(&series, &SignalParams::default()),
            Evaluation::Skipped(SkipReason::NotConfirmed)
        );
    }

    #[test]
    fn calendar_stepping_skips_after_gap_day() {
        // Mon 2024-01-08 follows a weekend: no Sunday session.
        let bars = vec![
            bar(5, 16, 0, 99.0, 100.0),
            bar(8, 9, 30, 101.0, 101.0),
            bar(8, 11, 15, 101.0, 102.0),
        ];
        let series = TimeSeries::new("TEST", bars).unwrap();
        let aggs = DailyAggregates::build(&series, &SessionWindow::regular_hours());

        let calendar = SignalParams::default();
        assert_eq!(
            detect(date(8), &aggs, &series, &calendar).unwrap(),
            Evaluation::Skipped(SkipReason::NoPriorSession)
        );

        let trading = SignalParams {
            day_stepping: DayStepping::TradingDay,
            ..SignalParams::default()
        };
        assert!(find_signal(date(8), &aggs, &series, &trading).unwrap().is_some());
    }

    #[test]
    fn day_without_aggregate_is_skipped() {
        let series = two_day_series(100.6, Some(101.0));
        let aggs = DailyAggregates::build(&series, &SessionWindow::regular_hours());
        assert_eq!(
            detect(date(9), &aggs, &series, &SignalParams::default()).unwrap(),
            Evaluation::Skipped(SkipReason::NoSessionOpen)
        );
    }

    #[test]
    fn params_deserialize_with_default_stepping() {
        let params: SignalParams =
            serde_json::from_str(r#"{"confirmation_time":"11:15","gap_threshold":0.01}"#).unwrap();
        assert_eq!(params.day_stepping, DayStepping::CalendarDay);
        assert_eq!(params.gap_threshold, 0.01);
    }

    #[test]
    fn aggregates_can_be_supplied_directly() {
        let series = two_day_series(100.6, Some(101.0));
        let aggs = DailyAggregates::from_aggregates([
            DailyAggregate {
                date: date(2),
                open: 99.0,
                close: 90.0,
                bar_count: 1,
            },
            DailyAggregate {
                date: date(3),
                open: 100.6,
                close: 100.6,
                bar_count: 1,
            },
        ]);
        let signal = find_signal(date(3), &aggs, &series, &SignalParams::default())
            .unwrap()
            .unwrap();
        assert_eq!(signal.prior_close, 90.0);
    }
}
