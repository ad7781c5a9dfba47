//! GapLab Runner: configuration, data loading, grid sweeps, export.
//!
//! This crate builds on `gaplab-core` to provide:
//! - TOML run configuration with validation
//! - CSV bar loading with date-range filtering and dataset fingerprints
//! - Parallel (drawdown, stop-loss) grid sweeps with cancellation and progress
//! - Per-combination summaries
//! - JSON/CSV artifact bundles

pub mod config;
pub mod data_loader;
pub mod export;
pub mod grid;
pub mod runner;
pub mod summary;

pub use config::{BacktestConfig, ConfigError, DataConfig, ExitConfig, RunSettings};
pub use data_loader::{load_series, read_series, LoadError, LoadOptions, LoadedData};
pub use export::{
    export_json, export_summary_csv, export_trades_csv, export_trades_json, import_json,
    load_artifacts, save_artifacts,
};
pub use grid::{
    run, sort_trades, CancelToken, GridRunner, ParamGrid, SignalScan, SweepResult, SweepStats,
};
pub use runner::{
    run_backtest_from_series, run_single_backtest, BacktestResult, RunError, SCHEMA_VERSION,
};
pub use summary::{summarize, ComboSummary};
