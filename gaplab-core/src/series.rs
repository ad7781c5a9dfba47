//! TimeSeries store: ordered, read-only minute bars for one instrument.
//!
//! Bars are held in a single sorted `Vec`, so every lookup is a binary
//! search and every range is a borrowed slice. Missing minutes are simply
//! absent: nothing is interpolated or zero-filled.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::domain::{Bar, SessionWindow};
use crate::error::CoreError;

#[derive(Debug, Clone)]
pub struct TimeSeries {
    symbol: String,
    bars: Vec<Bar>,
}

impl TimeSeries {
    /// Build a series from bars already sorted by timestamp.
    ///
    /// Returns [`CoreError::OutOfOrder`] on the first pair of bars whose
    /// timestamps are not strictly increasing.
    pub fn new(symbol: impl Into<String>, bars: Vec<Bar>) -> Result<Self, CoreError> {
        if let Some(pair) = bars.windows(2).find(|w| w[1].timestamp <= w[0].timestamp) {
            return Err(CoreError::OutOfOrder {
                previous: pair[0].timestamp,
                next: pair[1].timestamp,
            });
        }
        Ok(Self {
            symbol: symbol.into(),
            bars,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> Option<&Bar> {
        self.bars.first()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// Exact-timestamp lookup. `None` means no bar at that instant.
    pub fn get(&self, timestamp: NaiveDateTime) -> Option<&Bar> {
        self.bars
            .binary_search_by(|b| b.timestamp.cmp(&timestamp))
            .ok()
            .map(|i| &self.bars[i])
    }

    /// Bars with `start <= timestamp < end`, ascending.
    pub fn range(&self, start: NaiveDateTime, end: NaiveDateTime) -> &[Bar] {
        let lo = self.bars.partition_point(|b| b.timestamp < start);
        let hi = self.bars.partition_point(|b| b.timestamp < end);
        self.slice(lo, hi)
    }

    /// Bars with `start <= timestamp <= end`, ascending.
    pub fn range_inclusive(&self, start: NaiveDateTime, end: NaiveDateTime) -> &[Bar] {
        let lo = self.bars.partition_point(|b| b.timestamp < start);
        let hi = self.bars.partition_point(|b| b.timestamp <= end);
        self.slice(lo, hi)
    }

    /// All bars stamped on `date`, any time of day.
    pub fn on_date(&self, date: NaiveDate) -> &[Bar] {
        let lo = self.bars.partition_point(|b| b.timestamp.date() < date);
        let hi = self.bars.partition_point(|b| b.timestamp.date() <= date);
        self.slice(lo, hi)
    }

    /// Bars whose time-of-day lies in `[start_tod, end_tod]`, on any date.
    ///
    /// When `start_tod > end_tod` the range wraps past midnight.
    pub fn between_time_of_day(
        &self,
        start_tod: NaiveTime,
        end_tod: NaiveTime,
    ) -> impl Iterator<Item = &Bar> + '_ {
        self.bars.iter().filter(move |b| {
            let t = b.timestamp.time();
            if start_tod <= end_tod {
                t >= start_tod && t <= end_tod
            } else {
                t >= start_tod || t <= end_tod
            }
        })
    }

    /// Bars inside `window` on `date`, ascending.
    pub fn session_on(&self, date: NaiveDate, window: &SessionWindow) -> &[Bar] {
        self.range_inclusive(window.open_on(date), window.close_on(date))
    }

    /// First date after `date` that has at least one bar inside `window`.
    pub fn next_session_date(&self, date: NaiveDate, window: &SessionWindow) -> Option<NaiveDate> {
        let start = self.bars.partition_point(|b| b.timestamp.date() <= date);
        self.bars[start..]
            .iter()
            .find(|b| window.contains(b.timestamp.time()))
            .map(|b| b.timestamp.date())
    }

    /// BLAKE3 fingerprint over the symbol and every bar's content.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.symbol.as_bytes());
        for bar in &self.bars {
            hasher.update(bar.timestamp.to_string().as_bytes());
            hasher.update(&bar.open.to_le_bytes());
            hasher.update(&bar.high.to_le_bytes());
            hasher.update(&bar.low.to_le_bytes());
            hasher.update(&bar.close.to_le_bytes());
            hasher.update(&bar.volume.to_le_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }

    fn slice(&self, lo: usize, hi: usize) -> &[Bar] {
        if lo >= hi {
            &[]
        } else {
            &self.bars[lo..hi]
        }
    }
}
