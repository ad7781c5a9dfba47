//! Core error and skip taxonomy.
//!
//! Two very different kinds of "didn't produce a trade" exist:
//! - [`SkipReason`]: a normal, local outcome for one day/combination (missing
//!   bars, empty scan window, condition not met). Never escapes the day.
//! - [`CoreError`]: an invariant violation in the input data. Aborts the run.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal errors raised by the engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("bars out of order: {next} does not follow {previous}")]
    OutOfOrder {
        previous: NaiveDateTime,
        next: NaiveDateTime,
    },

    #[error("prior session {prior} resolved for {day} is not before it")]
    PriorSessionNotBefore { day: NaiveDate, prior: NaiveDate },

    #[error("invalid session window: open {open} must be before close {close}")]
    InvalidSessionWindow { open: NaiveTime, close: NaiveTime },
}

/// Taxonomy bucket for a skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipKind {
    /// A required timestamp or session is absent.
    MissingData,
    /// A required scan window holds zero bars.
    EmptyWindow,
    /// Data was present but the rule did not fire.
    NotTriggered,
}

/// Why a day (or a day × combination) produced no trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The day itself has no session aggregate.
    NoSessionOpen,
    /// The preceding day has no session aggregate.
    NoPriorSession,
    /// Session open below the prior close times (1 + threshold).
    GapTooSmall,
    /// No bar at exactly the confirmation time.
    MissingConfirmationBar,
    /// Confirmation close did not exceed the session open.
    NotConfirmed,
    /// No bars between the confirmation time and the session close.
    EmptyEntryWindow,
    /// No bar closed at or below the drawdown trigger.
    NoEntry,
    /// The following session has no bars (holiday, weekend, end of data).
    NoNextSession,
}

impl SkipReason {
    pub fn kind(self) -> SkipKind {
        match self {
            SkipReason::NoSessionOpen
            | SkipReason::NoPriorSession
            | SkipReason::MissingConfirmationBar
            | SkipReason::NoNextSession => SkipKind::MissingData,
            SkipReason::EmptyEntryWindow => SkipKind::EmptyWindow,
            SkipReason::GapTooSmall | SkipReason::NotConfirmed | SkipReason::NoEntry => {
                SkipKind::NotTriggered
            }
        }
    }
}

/// Outcome of a single evaluation step that may legitimately skip.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation<T> {
    Hit(T),
    Skipped(SkipReason),
}

impl<T> Evaluation<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Evaluation::Hit(value) => Some(value),
            Evaluation::Skipped(_) => None,
        }
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            Evaluation::Hit(_) => None,
            Evaluation::Skipped(reason) => Some(*reason),
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, Evaluation::Hit(_))
    }
}
