//! End-to-end scenarios: CSV text in, ordered trades out.
//!
//! Each fixture is a handful of hand-placed minute bars; gaps between them
//! are deliberate and exercise the "absence means no data" rule.

use gaplab_core::{DayStepping, ExitReason, SkipReason};
use gaplab_runner::{
    read_series, run_backtest_from_series, BacktestConfig, GridRunner, LoadOptions, ParamGrid,
};

// ── Fixtures ──

fn row(ts: &str, open: f64, close: f64) -> String {
    format!(
        "{ts},{open},{},{},{close},1000\n",
        open.max(close),
        open.min(close)
    )
}

/// Prior close 48, gap open 48.5, confirmation at 50, dip to 49 at 12:00,
/// target reached at 14:00 next day.
fn drawdown_csv() -> String {
    [
        row("2024-01-02 09:30:00", 47.8, 48.0),
        row("2024-01-02 16:00:00", 48.0, 48.0),
        row("2024-01-03 09:30:00", 48.5, 48.6),
        row("2024-01-03 11:15:00", 49.9, 50.0),
        row("2024-01-03 11:30:00", 50.0, 49.8),
        row("2024-01-03 12:00:00", 49.8, 49.0),
        row("2024-01-03 13:00:00", 49.0, 49.2),
        row("2024-01-03 16:00:00", 49.2, 49.3),
        row("2024-01-04 09:30:00", 49.1, 49.1),
        row("2024-01-04 12:00:00", 49.1, 48.5),
        row("2024-01-04 14:00:00", 48.5, 50.2),
        row("2024-01-04 16:00:00", 50.2, 49.9),
    ]
    .concat()
}

fn config(drawdown: &[f64], stop_loss: &[f64]) -> BacktestConfig {
    let mut config = BacktestConfig::default();
    config.data.symbol = "TEST".into();
    config.grid = ParamGrid::new(drawdown.to_vec(), stop_loss.to_vec());
    config
}

fn run(csv: &str, config: &BacktestConfig) -> gaplab_runner::BacktestResult {
    let loaded = read_series(csv.as_bytes(), &config.data.symbol, &LoadOptions::default()).unwrap();
    run_backtest_from_series(config, &loaded.series, &loaded.dataset_hash, None).unwrap()
}

// ── Gap gate ──

#[test]
fn gap_of_point_six_percent_passes_half_percent_threshold() {
    let csv = [
        row("2024-01-02 16:00:00", 100.0, 100.0),
        row("2024-01-03 09:30:00", 100.6, 100.7),
        row("2024-01-03 11:15:00", 100.9, 101.0),
    ]
    .concat();
    let result = run(&csv, &config(&[1.0], &[1.0]));
    assert_eq!(result.signals.len(), 1);
    assert_eq!(result.signals[0].day_open, 100.6);
    assert_eq!(result.signals[0].prior_close, 100.0);
}

#[test]
fn missing_confirmation_bar_yields_no_trades_anywhere() {
    let csv = drawdown_csv().replace("2024-01-03 11:15:00", "2024-01-03 11:16:00");
    let result = run(&csv, &BacktestConfig::default());
    assert!(result.signals.is_empty());
    assert!(result.trades.is_empty());
    assert_eq!(
        result.stats.day_skips.get(&SkipReason::MissingConfirmationBar),
        Some(&1)
    );
    assert!(result.summaries.iter().all(|s| s.trade_count == 0));
}

// ── Entry and exit ──

#[test]
fn drawdown_entry_fills_at_first_close_under_trigger() {
    let result = run(&drawdown_csv(), &config(&[1.0], &[2.0]));
    assert_eq!(result.trades.len(), 1);
    let t = &result.trades[0];
    assert_eq!(t.signal_price, 50.0);
    assert_eq!(t.entry_price, 49.0);
    assert!(t.entry_price <= 49.5);
    assert_eq!(t.entry_time.to_string(), "2024-01-03 12:00:00");
}

#[test]
fn profit_target_when_stop_never_reached() {
    let result = run(&drawdown_csv(), &config(&[1.0], &[2.0]));
    let t = &result.trades[0];
    // Stop at 49 * 0.98 = 48.02; the lowest next-day close is 48.5.
    assert_eq!(t.exit_reason, ExitReason::ProfitTarget);
    assert!(t.exit_price >= 50.0);
    assert_eq!(t.exit_time.to_string(), "2024-01-04 14:00:00");
    let expected = (50.2 - 49.0) / 49.0 * 100.0;
    assert!((t.return_pct - expected).abs() < 1e-9 * expected.abs());
}

#[test]
fn tight_stop_beats_later_target() {
    // 0.5% stop = 48.755; the 12:00 close of 48.5 on the 4th hits it.
    let result = run(&drawdown_csv(), &config(&[1.0], &[0.5]));
    let t = &result.trades[0];
    assert_eq!(t.exit_reason, ExitReason::StopLoss);
    assert_eq!(t.exit_price, 48.5);
}

#[test]
fn deep_drawdown_never_enters() {
    let result = run(&drawdown_csv(), &config(&[5.0], &[1.0]));
    assert!(result.trades.is_empty());
    assert_eq!(result.stats.trade_skips.get(&SkipReason::NoEntry), Some(&1));
}

#[test]
fn forced_exit_at_last_next_session_bar() {
    let csv = drawdown_csv().replace(
        &row("2024-01-04 14:00:00", 48.5, 50.2),
        &row("2024-01-04 14:00:00", 48.5, 49.6),
    );
    let csv = csv.replace(
        &row("2024-01-04 16:00:00", 50.2, 49.9),
        &row("2024-01-04 16:00:00", 49.6, 49.7),
    );
    let result = run(&csv, &config(&[1.0], &[2.0]));
    let t = &result.trades[0];
    assert_eq!(t.exit_reason, ExitReason::Forced);
    assert_eq!(t.exit_price, 49.7);
    assert_eq!(t.lowest_price, 48.5);
}

// ── Holidays ──

/// Gap day before Independence Day; the market reopens on the 5th.
fn holiday_csv() -> String {
    [
        row("2024-07-02 16:00:00", 100.0, 100.0),
        row("2024-07-03 09:30:00", 101.0, 101.0),
        row("2024-07-03 11:15:00", 101.5, 102.0),
        row("2024-07-03 12:00:00", 102.0, 100.8),
        row("2024-07-03 13:00:00", 100.8, 101.0),
        row("2024-07-05 09:30:00", 101.0, 101.2),
        row("2024-07-05 10:00:00", 101.2, 102.3),
        row("2024-07-05 16:00:00", 102.3, 101.9),
    ]
    .concat()
}

#[test]
fn holiday_after_entry_yields_no_trade_under_calendar_stepping() {
    let result = run(&holiday_csv(), &config(&[1.0], &[1.0]));
    assert_eq!(result.signals.len(), 1);
    assert!(result.trades.is_empty());
    assert_eq!(
        result.stats.trade_skips.get(&SkipReason::NoNextSession),
        Some(&1)
    );
}

#[test]
fn trading_day_stepping_carries_over_the_holiday() {
    let mut config = config(&[1.0], &[1.0]);
    config.signal.day_stepping = DayStepping::TradingDay;
    let result = run(&holiday_csv(), &config);
    assert_eq!(result.trades.len(), 1);
    let t = &result.trades[0];
    assert_eq!(t.exit_reason, ExitReason::ProfitTarget);
    assert_eq!(t.exit_time.to_string(), "2024-07-05 10:00:00");
}

// ── Grid behaviour ──

#[test]
fn full_grid_is_ordered_and_repeatable() {
    let config = BacktestConfig::default();
    let a = run(&drawdown_csv(), &config);
    let b = run(&drawdown_csv(), &config);
    assert_eq!(a.trades, b.trades);

    let keys: Vec<(f64, f64)> = a
        .trades
        .iter()
        .map(|t| (t.drawdown_level, t.stop_loss_level))
        .collect();
    let mut sorted = keys.clone();
    sorted.sort_by(|x, y| x.0.total_cmp(&y.0).then(x.1.total_cmp(&y.1)));
    assert_eq!(keys, sorted);
    // Every default drawdown level (max 1%) is reached by the 12:00 dip.
    assert_eq!(a.trades.len(), 16);
}

#[test]
fn sequential_and_parallel_sweeps_agree() {
    let loaded =
        read_series(drawdown_csv().as_bytes(), "TEST", &LoadOptions::default()).unwrap();
    let mut config = BacktestConfig::default();
    config.run.parallel = false;
    let seq = GridRunner::from_config(&config)
        .sweep(&loaded.series, &config.grid)
        .unwrap();
    config.run.parallel = true;
    let par = GridRunner::from_config(&config)
        .sweep(&loaded.series, &config.grid)
        .unwrap();
    assert_eq!(seq.trades, par.trades);
    assert_eq!(seq.stats, par.stats);
}
