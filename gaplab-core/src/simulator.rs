//! Trade simulation: drawdown entry, stop-loss, profit target, forced exit.
//!
//! Lifecycle per (signal, risk levels):
//! 1. Entry search over the signal day, confirmation bar → session close.
//! 2. Exit search over the hold, up to the next session's close.
//! 3. Exit resolution according to [`ExitPriority`].
//!
//! Every call starts from a clean local state; the simulator keeps nothing
//! between evaluations.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::aggregate::DayStepping;
use crate::domain::{Bar, ExitReason, SessionWindow, Trade};
use crate::error::{Evaluation, SkipReason};
use crate::series::TimeSeries;
use crate::signal::SignalEvent;

/// Which exit wins when both a stop-loss and a profit-target bar exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitPriority {
    /// Stop-loss wins regardless of timing.
    #[default]
    StopLossFirst,
    /// Whichever level is hit first wins.
    Chronological,
}

/// Which bars are eligible to trigger an exit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitScope {
    /// Every bar after the entry up to the next session's close.
    #[default]
    HoldingWindow,
    /// Only bars inside the next session.
    NextSession,
}

/// One point of the parameter grid, both in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskLevels {
    pub drawdown: f64,
    pub stop_loss: f64,
}

impl RiskLevels {
    pub fn new(drawdown: f64, stop_loss: f64) -> Self {
        Self {
            drawdown,
            stop_loss,
        }
    }

    /// Entry trigger: `signal_price * (1 - drawdown / 100)`.
    pub fn entry_trigger(&self, signal_price: f64) -> f64 {
        signal_price * (1.0 - self.drawdown / 100.0)
    }

    /// Stop price: `entry_price * (1 - stop_loss / 100)`.
    pub fn stop_price(&self, entry_price: f64) -> f64 {
        entry_price * (1.0 - self.stop_loss / 100.0)
    }
}

/// Policies that stay fixed across the whole grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationPolicy {
    pub session: SessionWindow,
    pub day_stepping: DayStepping,
    pub exit_priority: ExitPriority,
    pub exit_scope: ExitScope,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TradeSimulator {
    policy: SimulationPolicy,
}

impl TradeSimulator {
    pub fn new(policy: SimulationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &SimulationPolicy {
        &self.policy
    }

    /// Completed trade for `signal` at `levels`, or `None`.
    pub fn simulate(
        &self,
        signal: &SignalEvent,
        series: &TimeSeries,
        levels: RiskLevels,
    ) -> Option<Trade> {
        self.evaluate(signal, series, levels).into_option()
    }

    /// Same as [`simulate`](Self::simulate) but reports why no trade resulted.
    pub fn evaluate(
        &self,
        signal: &SignalEvent,
        series: &TimeSeries,
        levels: RiskLevels,
    ) -> Evaluation<Trade> {
        let session = &self.policy.session;

        // ── Phase 1: entry search ──
        let entry_window =
            series.range_inclusive(signal.confirmation_timestamp, session.close_on(signal.day));
        if entry_window.is_empty() {
            return Evaluation::Skipped(SkipReason::EmptyEntryWindow);
        }
        let trigger = levels.entry_trigger(signal.signal_price);
        let Some(entry) = entry_window.iter().find(|b| b.close <= trigger) else {
            return Evaluation::Skipped(SkipReason::NoEntry);
        };

        // ── Phase 2: exit search ──
        let Some(next_day) = self.next_day(signal.day, series) else {
            return Evaluation::Skipped(SkipReason::NoNextSession);
        };
        let next_close = session.close_on(next_day);
        let hold = series.range_inclusive(entry.timestamp, next_close);
        let lowest_price = hold.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
        let next_session = series.session_on(next_day, session);

        let candidates = match self.policy.exit_scope {
            ExitScope::HoldingWindow => hold.split_first().map_or(&[][..], |(_, rest)| rest),
            ExitScope::NextSession => next_session,
        };
        let stop_price = levels.stop_price(entry.close);
        let stop_hit = candidates.iter().find(|b| b.close <= stop_price);
        let target_hit = candidates.iter().find(|b| b.close >= signal.signal_price);

        // ── Phase 3: resolution ──
        let (exit, exit_reason) = match resolve(stop_hit, target_hit, self.policy.exit_priority) {
            Some(hit) => hit,
            None => match next_session.last() {
                Some(last) => (last, ExitReason::Forced),
                None => return Evaluation::Skipped(SkipReason::NoNextSession),
            },
        };

        Evaluation::Hit(Trade {
            symbol: series.symbol().to_string(),
            signal_time: signal.confirmation_timestamp,
            signal_price: signal.signal_price,
            entry_price: entry.close,
            entry_time: entry.timestamp,
            lowest_price,
            exit_price: exit.close,
            exit_time: exit.timestamp,
            exit_reason,
            return_pct: Trade::compute_return_pct(entry.close, exit.close),
            drawdown_level: levels.drawdown,
            stop_loss_level: levels.stop_loss,
        })
    }

    fn next_day(&self, day: NaiveDate, series: &TimeSeries) -> Option<NaiveDate> {
        match self.policy.day_stepping {
            DayStepping::CalendarDay => day.succ_opt(),
            // Past the last session the hold ends like a calendar step, so
            // stop and target hits after entry still resolve.
            DayStepping::TradingDay => series
                .next_session_date(day, &self.policy.session)
                .or_else(|| day.succ_opt()),
        }
    }
}

fn resolve<'a>(
    stop_hit: Option<&'a Bar>,
    target_hit: Option<&'a Bar>,
    priority: ExitPriority,
) -> Option<(&'a Bar, ExitReason)> {
    match (stop_hit, target_hit) {
        (Some(stop), Some(target))
            if priority == ExitPriority::Chronological && target.timestamp < stop.timestamp =>
        {
            Some((target, ExitReason::ProfitTarget))
        }
        (Some(stop), _) => Some((stop, ExitReason::StopLoss)),
        (None, Some(target)) => Some((target, ExitReason::ProfitTarget)),
        (None, None) => None,
    }
}
