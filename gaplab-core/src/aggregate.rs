//! Session aggregation: one open/close pair per calendar day.
//!
//! Only bars inside the session window count. A day with no session bars
//! gets no aggregate at all; it is never zero-filled.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::SessionWindow;
use crate::series::TimeSeries;

/// Session open and close for one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyAggregate {
    pub date: NaiveDate,
    /// Open of the earliest bar inside the session window.
    pub open: f64,
    /// Close of the latest bar inside the session window.
    pub close: f64,
    pub bar_count: usize,
}

/// How "the previous day" and "the next day" are resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayStepping {
    /// Literal neighbouring calendar date. A weekend or holiday neighbour
    /// has no session, so the day is skipped.
    #[default]
    CalendarDay,
    /// Nearest earlier/later date that has a session. Past the last session
    /// the next day falls back to the calendar step.
    TradingDay,
}

/// Build one aggregate per date with at least one bar inside `window`.
///
/// Grouping is keyed by date and within a group the earliest/latest bar is
/// chosen by timestamp, so the result does not depend on bar order.
pub fn build_daily_aggregates(series: &TimeSeries, window: &SessionWindow) -> Vec<DailyAggregate> {
    struct Acc {
        first: NaiveDateTime,
        open: f64,
        last: NaiveDateTime,
        close: f64,
        count: usize,
    }

    let mut groups: BTreeMap<NaiveDate, Acc> = BTreeMap::new();
    for bar in series
        .bars()
        .iter()
        .filter(|b| window.contains(b.timestamp.time()))
    {
        let acc = groups.entry(bar.timestamp.date()).or_insert(Acc {
            first: bar.timestamp,
            open: bar.open,
            last: bar.timestamp,
            close: bar.close,
            count: 0,
        });
        if bar.timestamp < acc.first {
            acc.first = bar.timestamp;
            acc.open = bar.open;
        }
        if bar.timestamp > acc.last {
            acc.last = bar.timestamp;
            acc.close = bar.close;
        }
        acc.count += 1;
    }

    groups
        .into_iter()
        .map(|(date, acc)| DailyAggregate {
            date,
            open: acc.open,
            close: acc.close,
            bar_count: acc.count,
        })
        .collect()
}

/// Date-indexed daily aggregates with neighbour lookups.
#[derive(Debug, Clone, Default)]
pub struct DailyAggregates {
    days: BTreeMap<NaiveDate, DailyAggregate>,
}

impl DailyAggregates {
    pub fn build(series: &TimeSeries, window: &SessionWindow) -> Self {
        Self::from_aggregates(build_daily_aggregates(series, window))
    }

    pub fn from_aggregates(aggregates: impl IntoIterator<Item = DailyAggregate>) -> Self {
        Self {
            days: aggregates.into_iter().map(|a| (a.date, a)).collect(),
        }
    }

    pub fn get(&self, date: NaiveDate) -> Option<&DailyAggregate> {
        self.days.get(&date)
    }

    /// Dates in ascending order.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.days.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// The aggregate that counts as "yesterday" for `date`.
    pub fn prior(&self, date: NaiveDate, stepping: DayStepping) -> Option<&DailyAggregate> {
        match stepping {
            DayStepping::CalendarDay => date.pred_opt().and_then(|d| self.days.get(&d)),
            DayStepping::TradingDay => self.days.range(..date).next_back().map(|(_, a)| a),
        }
    }
}
