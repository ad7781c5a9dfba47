//! Trade: a completed entry → exit cycle for one day and one grid point.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// How a simulated trade was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    ProfitTarget,
    /// Neither level was hit; closed at the last bar of the next session.
    Forced,
}

impl ExitReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::ProfitTarget => "profit_target",
            ExitReason::Forced => "forced",
        }
    }
}

/// Immutable record of one simulated trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    // ── Identification ──
    pub symbol: String,
    /// Timestamp of the confirmation bar that produced the signal.
    pub signal_time: NaiveDateTime,
    pub signal_price: f64,

    // ── Entry ──
    pub entry_price: f64,
    pub entry_time: NaiveDateTime,

    // ── Hold ──
    /// Lowest low from entry through the next session close. Informational.
    pub lowest_price: f64,

    // ── Exit ──
    pub exit_price: f64,
    pub exit_time: NaiveDateTime,
    pub exit_reason: ExitReason,
    /// `(exit - entry) / entry * 100`.
    pub return_pct: f64,

    // ── Grid point ──
    pub drawdown_level: f64,
    pub stop_loss_level: f64,
}

impl Trade {
    pub fn compute_return_pct(entry_price: f64, exit_price: f64) -> f64 {
        (exit_price - entry_price) / entry_price * 100.0
    }

    pub fn is_winner(&self) -> bool {
        self.return_pct > 0.0
    }
}
