//! Backtest runner: wires together loading, sweeping, and summaries.
//!
//! Two entry points:
//! - `run_single_backtest()`: loads the configured CSV, then runs. Used by CLI.
//! - `run_backtest_from_series()`: takes a pre-loaded series. No I/O.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use gaplab_core::{CoreError, SignalEvent, TimeSeries, Trade};

use crate::config::{BacktestConfig, ConfigError};
use crate::data_loader::{load_series, LoadError, LoadOptions};
use crate::grid::{CancelToken, GridRunner, SweepStats};
use crate::summary::{summarize, ComboSummary};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("invariant violated: {0}")]
    Core(#[from] CoreError),
    #[error("no data file given (set [data].path or pass --data)")]
    MissingDataPath,
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of one grid backtest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub symbol: String,
    pub start_date: String,
    pub end_date: String,
    pub dataset_hash: String,
    pub config_hash: String,
    pub bar_count: usize,
    pub config: BacktestConfig,
    pub stats: SweepStats,
    pub summaries: Vec<ComboSummary>,
    pub signals: Vec<SignalEvent>,
    pub trades: Vec<Trade>,
    pub cancelled: bool,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Run a backtest from a config, loading bars from `data_path` or, when
/// absent, the config's `[data].path`.
pub fn run_single_backtest(
    config: &BacktestConfig,
    data_path: Option<&Path>,
    cancel: Option<CancelToken>,
) -> Result<BacktestResult, RunError> {
    config.validate()?;
    let path = data_path
        .or(config.data.path.as_deref())
        .ok_or(RunError::MissingDataPath)?;
    let loaded = load_series(path, &config.data.symbol, &LoadOptions::from_config(config))?;
    run_backtest_from_series(config, &loaded.series, &loaded.dataset_hash, cancel)
}

/// Run a backtest on a pre-loaded series.
pub fn run_backtest_from_series(
    config: &BacktestConfig,
    series: &TimeSeries,
    dataset_hash: &str,
    cancel: Option<CancelToken>,
) -> Result<BacktestResult, RunError> {
    let mut runner = GridRunner::from_config(config);
    if let Some(token) = cancel {
        runner = runner.with_cancel_token(token);
    }
    let sweep = runner.sweep(series, &config.grid)?;
    let summaries = summarize(&config.grid, &sweep.trades);

    let date_of = |bar: Option<&gaplab_core::Bar>| {
        bar.map(|b| b.timestamp.date().to_string())
            .unwrap_or_default()
    };

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        symbol: series.symbol().to_string(),
        start_date: date_of(series.first()),
        end_date: date_of(series.last()),
        dataset_hash: dataset_hash.to_string(),
        config_hash: config.config_hash(),
        bar_count: series.len(),
        config: config.clone(),
        stats: sweep.stats,
        summaries,
        signals: sweep.signals,
        trades: sweep.trades,
        cancelled: sweep.cancelled,
    })
}
