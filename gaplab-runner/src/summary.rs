//! Per-combination trade statistics.
//!
//! Descriptive only: every function is trades in, scalar out. No equity
//! curve, no compounding; each trade's `return_pct` stands on its own.

use serde::{Deserialize, Serialize};

use gaplab_core::{ExitReason, Trade};

use crate::grid::ParamGrid;

/// Statistics for one (drawdown, stop-loss) combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComboSummary {
    pub drawdown_level: f64,
    pub stop_loss_level: f64,
    pub trade_count: usize,
    /// Fraction of trades with a positive return.
    pub win_rate: f64,
    pub mean_return_pct: f64,
    pub min_return_pct: f64,
    pub max_return_pct: f64,
    pub profit_factor: f64,
    pub stop_loss_exits: usize,
    pub profit_target_exits: usize,
    pub forced_exits: usize,
}

impl ComboSummary {
    pub fn compute(drawdown_level: f64, stop_loss_level: f64, trades: &[&Trade]) -> Self {
        let count_reason =
            |reason: ExitReason| trades.iter().filter(|t| t.exit_reason == reason).count();
        let returns: Vec<f64> = trades.iter().map(|t| t.return_pct).collect();
        Self {
            drawdown_level,
            stop_loss_level,
            trade_count: trades.len(),
            win_rate: win_rate(trades),
            mean_return_pct: mean(&returns),
            min_return_pct: returns.iter().copied().reduce(f64::min).unwrap_or(0.0),
            max_return_pct: returns.iter().copied().reduce(f64::max).unwrap_or(0.0),
            profit_factor: profit_factor(&returns),
            stop_loss_exits: count_reason(ExitReason::StopLoss),
            profit_target_exits: count_reason(ExitReason::ProfitTarget),
            forced_exits: count_reason(ExitReason::Forced),
        }
    }
}

/// One summary per grid combination, in grid order, including
/// combinations that produced no trades.
pub fn summarize(grid: &ParamGrid, trades: &[Trade]) -> Vec<ComboSummary> {
    grid.combinations()
        .into_iter()
        .map(|levels| {
            let matching: Vec<&Trade> = trades
                .iter()
                .filter(|t| {
                    t.drawdown_level == levels.drawdown && t.stop_loss_level == levels.stop_loss
                })
                .collect();
            ComboSummary::compute(levels.drawdown, levels.stop_loss, &matching)
        })
        .collect()
}

// ─── Individual statistics ──────────────────────────────────────────

pub fn win_rate(trades: &[&Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().filter(|t| t.is_winner()).count() as f64 / trades.len() as f64
}

pub fn mean(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    returns.iter().sum::<f64>() / returns.len() as f64
}

/// Sum of gains over sum of losses.
///
/// Capped at 100.0 for edge cases (all winners, zero losses).
pub fn profit_factor(returns: &[f64]) -> f64 {
    let gains: f64 = returns.iter().filter(|r| **r > 0.0).sum();
    let losses: f64 = returns.iter().filter(|r| **r < 0.0).map(|r| r.abs()).sum();
    if losses < 1e-10 {
        return if gains > 0.0 { 100.0 } else { 0.0 };
    }
    (gains / losses).min(100.0)
}
