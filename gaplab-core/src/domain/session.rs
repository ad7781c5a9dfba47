//! Session window: the time-of-day range that counts as "the trading day".

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Trading session bounds, inclusive at both ends.
///
/// With the default 09:30–16:00 window both the 09:30 and the 16:00 bar
/// belong to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionWindow {
    #[serde(with = "time_of_day")]
    open: NaiveTime,
    #[serde(with = "time_of_day")]
    close: NaiveTime,
}

impl SessionWindow {
    pub fn new(open: NaiveTime, close: NaiveTime) -> Result<Self, CoreError> {
        if open >= close {
            return Err(CoreError::InvalidSessionWindow { open, close });
        }
        Ok(Self { open, close })
    }

    /// US equities regular hours, 09:30–16:00.
    pub fn regular_hours() -> Self {
        Self {
            open: hm(9, 30),
            close: hm(16, 0),
        }
    }

    pub fn open(&self) -> NaiveTime {
        self.open
    }

    pub fn close(&self) -> NaiveTime {
        self.close
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        time >= self.open && time <= self.close
    }

    pub fn open_on(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.open)
    }

    pub fn close_on(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.close)
    }
}

impl Default for SessionWindow {
    fn default() -> Self {
        Self::regular_hours()
    }
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

/// Serde adapter for `HH:MM` (or `HH:MM:SS`) times of day.
pub mod time_of_day {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMATS: [&str; 2] = ["%H:%M", "%H:%M:%S"];

    pub fn parse(s: &str) -> Option<NaiveTime> {
        FORMATS
            .iter()
            .find_map(|fmt| NaiveTime::parse_from_str(s.trim(), fmt).ok())
    }

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid time of day '{s}', expected HH:MM"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_are_inclusive() {
        let window = SessionWindow::regular_hours();
        assert!(window.contains(hm(9, 30)));
        assert!(window.contains(hm(16, 0)));
        assert!(!window.contains(hm(9, 29)));
        assert!(!window.contains(hm(16, 1)));
    }

    #[test]
    fn rejects_inverted_window() {
        let err = SessionWindow::new(hm(16, 0), hm(9, 30)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidSessionWindow { .. }));
        assert!(SessionWindow::new(hm(9, 30), hm(9, 30)).is_err());
    }

    #[test]
    fn time_of_day_accepts_both_formats() {
        assert_eq!(time_of_day::parse("11:15"), Some(hm(11, 15)));
        assert_eq!(time_of_day::parse("11:15:00"), Some(hm(11, 15)));
        assert_eq!(time_of_day::parse("quarter past"), None);
    }

    #[test]
    fn window_serializes_as_hh_mm() {
        let json = serde_json::to_string(&SessionWindow::regular_hours()).unwrap();
        assert_eq!(json, r#"{"open":"09:30","close":"16:00"}"#);
        let back: SessionWindow = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SessionWindow::regular_hours());
    }
}
