//! Grid sweep over (drawdown, stop-loss) combinations.
//!
//! Signals depend only on the day, so the sweep detects them once and then
//! fans every combination out over the rayon pool. Each combination owns a
//! private trade buffer; buffers are merged and sorted at the end, so the
//! output is identical in parallel and sequential mode.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::NaiveTime;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use gaplab_core::{
    detect, CoreError, DailyAggregates, Evaluation, RiskLevels, SessionWindow, SignalEvent,
    SignalParams, SimulationPolicy, SkipReason, TimeSeries, Trade, TradeSimulator,
};

use crate::config::BacktestConfig;

/// Drawdown and stop-loss levels to sweep.
///
/// Levels are percentages. Combinations are generated drawdown-major, and a
/// level repeated in either list is swept once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamGrid {
    pub drawdown_levels: Vec<f64>,
    pub stop_loss_levels: Vec<f64>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            drawdown_levels: vec![0.25, 0.5, 0.75, 1.0],
            stop_loss_levels: vec![0.5, 1.0, 1.5, 2.0],
        }
    }
}

impl ParamGrid {
    pub fn new(drawdown_levels: Vec<f64>, stop_loss_levels: Vec<f64>) -> Self {
        Self {
            drawdown_levels,
            stop_loss_levels,
        }
    }

    /// Returns the total number of combinations in this grid.
    pub fn size(&self) -> usize {
        distinct(&self.drawdown_levels).len() * distinct(&self.stop_loss_levels).len()
    }

    pub fn combinations(&self) -> Vec<RiskLevels> {
        let stop_losses = distinct(&self.stop_loss_levels);
        distinct(&self.drawdown_levels)
            .into_iter()
            .flat_map(|dd| stop_losses.iter().map(move |&sl| RiskLevels::new(dd, sl)))
            .collect()
    }
}

/// First occurrence of each level, in input order.
fn distinct(levels: &[f64]) -> Vec<f64> {
    let mut out: Vec<f64> = Vec::with_capacity(levels.len());
    for &level in levels {
        if !out.contains(&level) {
            out.push(level);
        }
    }
    out
}

/// Cooperative cancellation flag shared between the caller and a sweep.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Counters describing what a sweep looked at and why days fell out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepStats {
    /// Days with at least one session bar.
    pub candidate_days: usize,
    pub signals: usize,
    pub trades: usize,
    /// Per-day detector skips.
    pub day_skips: BTreeMap<SkipReason, usize>,
    /// Per-(signal, combination) simulator skips.
    pub trade_skips: BTreeMap<SkipReason, usize>,
}

/// Output of one sweep.
#[derive(Debug, Clone)]
pub struct SweepResult {
    /// Sorted by (drawdown_level, stop_loss_level, entry_time).
    pub trades: Vec<Trade>,
    pub signals: Vec<SignalEvent>,
    pub stats: SweepStats,
    pub combinations_completed: usize,
    pub combinations_total: usize,
    /// True when the token stopped the sweep before every combination ran.
    pub cancelled: bool,
}

/// Signals of every candidate day plus the detector's skip counts.
#[derive(Debug, Clone, Default)]
pub struct SignalScan {
    pub candidate_days: usize,
    pub signals: Vec<SignalEvent>,
    pub skips: BTreeMap<SkipReason, usize>,
}

struct ComboOutcome {
    trades: Vec<Trade>,
    skips: BTreeMap<SkipReason, usize>,
}

/// Grid sweep executor.
#[derive(Debug, Clone)]
pub struct GridRunner {
    params: SignalParams,
    simulator: TradeSimulator,
    parallel: bool,
    cancel: CancelToken,
}

impl GridRunner {
    /// The signal's day stepping is applied to the simulator as well.
    pub fn new(params: SignalParams, mut policy: SimulationPolicy) -> Self {
        policy.day_stepping = params.day_stepping;
        Self {
            params,
            simulator: TradeSimulator::new(policy),
            parallel: true,
            cancel: CancelToken::new(),
        }
    }

    pub fn from_config(config: &BacktestConfig) -> Self {
        Self::new(config.signal, config.simulation_policy()).with_parallelism(config.run.parallel)
    }

    /// Enables or disables parallel execution.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn session(&self) -> &SessionWindow {
        &self.simulator.policy().session
    }

    /// Run the detector over every aggregate day.
    pub fn scan_signals(
        &self,
        series: &TimeSeries,
        aggregates: &DailyAggregates,
    ) -> Result<SignalScan, CoreError> {
        let mut scan = SignalScan {
            candidate_days: aggregates.len(),
            ..SignalScan::default()
        };
        for day in aggregates.dates() {
            match detect(day, aggregates, series, &self.params)? {
                Evaluation::Hit(signal) => scan.signals.push(signal),
                Evaluation::Skipped(reason) => {
                    tracing::debug!(%day, ?reason, "day skipped");
                    *scan.skips.entry(reason).or_default() += 1;
                }
            }
        }
        Ok(scan)
    }

    /// Executes the sweep over the given grid.
    pub fn sweep(&self, series: &TimeSeries, grid: &ParamGrid) -> Result<SweepResult, CoreError> {
        self.sweep_with_progress(series, grid, |_, _| {})
    }

    /// Executes the sweep with progress reporting.
    ///
    /// The callback is invoked after each combination completes with the
    /// number of completed combinations and the total.
    pub fn sweep_with_progress<F>(
        &self,
        series: &TimeSeries,
        grid: &ParamGrid,
        progress_callback: F,
    ) -> Result<SweepResult, CoreError>
    where
        F: Fn(usize, usize) + Send + Sync,
    {
        let aggregates = DailyAggregates::build(series, self.session());
        let scan = self.scan_signals(series, &aggregates)?;
        let combos = grid.combinations();
        let total = combos.len();

        tracing::info!(
            symbol = series.symbol(),
            days = scan.candidate_days,
            signals = scan.signals.len(),
            combinations = total,
            parallel = self.parallel,
            "starting grid sweep"
        );

        let done = AtomicUsize::new(0);
        let run_combo = |levels: &RiskLevels| -> Option<ComboOutcome> {
            if self.cancel.is_cancelled() {
                return None;
            }
            let outcome = self.evaluate_combo(&scan.signals, series, *levels);
            progress_callback(done.fetch_add(1, Ordering::Relaxed) + 1, total);
            Some(outcome)
        };

        let outcomes: Vec<Option<ComboOutcome>> = if self.parallel {
            combos.par_iter().map(run_combo).collect()
        } else {
            combos.iter().map(run_combo).collect()
        };

        let mut trades = Vec::new();
        let mut trade_skips: BTreeMap<SkipReason, usize> = BTreeMap::new();
        let mut completed = 0;
        for outcome in outcomes.into_iter().flatten() {
            completed += 1;
            trades.extend(outcome.trades);
            for (reason, count) in outcome.skips {
                *trade_skips.entry(reason).or_default() += count;
            }
        }
        sort_trades(&mut trades);

        let cancelled = completed < total;
        if cancelled {
            tracing::warn!(completed, total, "grid sweep cancelled");
        }
        tracing::info!(trades = trades.len(), completed, total, "grid sweep finished");

        let stats = SweepStats {
            candidate_days: scan.candidate_days,
            signals: scan.signals.len(),
            trades: trades.len(),
            day_skips: scan.skips,
            trade_skips,
        };

        Ok(SweepResult {
            trades,
            signals: scan.signals,
            stats,
            combinations_completed: completed,
            combinations_total: total,
            cancelled,
        })
    }

    fn evaluate_combo(
        &self,
        signals: &[SignalEvent],
        series: &TimeSeries,
        levels: RiskLevels,
    ) -> ComboOutcome {
        let mut outcome = ComboOutcome {
            trades: Vec::new(),
            skips: BTreeMap::new(),
        };
        for signal in signals {
            match self.simulator.evaluate(signal, series, levels) {
                Evaluation::Hit(trade) => outcome.trades.push(trade),
                Evaluation::Skipped(reason) => *outcome.skips.entry(reason).or_default() += 1,
            }
        }
        outcome
    }
}

/// Orders trades by (drawdown_level, stop_loss_level, entry_time).
pub fn sort_trades(trades: &mut [Trade]) {
    trades.sort_by(|a, b| {
        a.drawdown_level
            .total_cmp(&b.drawdown_level)
            .then(a.stop_loss_level.total_cmp(&b.stop_loss_level))
            .then(a.entry_time.cmp(&b.entry_time))
    });
}

/// Plain-parameter entry point with the historical exit policies.
pub fn run(
    series: &TimeSeries,
    session: SessionWindow,
    gap_threshold: f64,
    confirmation_time: NaiveTime,
    drawdown_levels: &[f64],
    stop_loss_levels: &[f64],
) -> Result<Vec<Trade>, CoreError> {
    let params = SignalParams {
        confirmation_time,
        gap_threshold,
        ..SignalParams::default()
    };
    let policy = SimulationPolicy {
        session,
        ..SimulationPolicy::default()
    };
    let grid = ParamGrid::new(drawdown_levels.to_vec(), stop_loss_levels.to_vec());
    GridRunner::new(params, policy)
        .sweep(series, &grid)
        .map(|result| result.trades)
}
