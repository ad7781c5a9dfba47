//! Export: JSON and CSV artifact generation.
//!
//! - **JSON**: full round-trip serialization with schema versioning
//! - **CSV**: trade tape and per-combination summary for spreadsheets
//!
//! Persisted manifests carry a `schema_version`; newer versions are
//! rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use gaplab_core::Trade;

use crate::runner::{BacktestResult, SCHEMA_VERSION};
use crate::summary::ComboSummary;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

/// Serialize a bare trade list to pretty JSON.
pub fn export_trades_json(trades: &[Trade]) -> Result<String> {
    serde_json::to_string_pretty(trades).context("failed to serialize trades to JSON")
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export a trade list as CSV.
///
/// Columns: symbol, signal_time, signal_price, entry_price, entry_time,
/// lowest_price, exit_price, exit_time, return_pct, drawdown_level,
/// stop_loss_level, exit_reason
pub fn export_trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "symbol",
        "signal_time",
        "signal_price",
        "entry_price",
        "entry_time",
        "lowest_price",
        "exit_price",
        "exit_time",
        "return_pct",
        "drawdown_level",
        "stop_loss_level",
        "exit_reason",
    ])?;

    for t in trades {
        wtr.write_record([
            t.symbol.clone(),
            t.signal_time.format(TIMESTAMP_FORMAT).to_string(),
            format!("{:.4}", t.signal_price),
            format!("{:.4}", t.entry_price),
            t.entry_time.format(TIMESTAMP_FORMAT).to_string(),
            format!("{:.4}", t.lowest_price),
            format!("{:.4}", t.exit_price),
            t.exit_time.format(TIMESTAMP_FORMAT).to_string(),
            format!("{:.6}", t.return_pct),
            t.drawdown_level.to_string(),
            t.stop_loss_level.to_string(),
            t.exit_reason.as_str().to_string(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export per-combination summaries as CSV, one row per combination.
pub fn export_summary_csv(summaries: &[ComboSummary]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "drawdown_level",
        "stop_loss_level",
        "trade_count",
        "win_rate",
        "mean_return_pct",
        "min_return_pct",
        "max_return_pct",
        "profit_factor",
        "stop_loss_exits",
        "profit_target_exits",
        "forced_exits",
    ])?;
    for s in summaries {
        wtr.write_record([
            s.drawdown_level.to_string(),
            s.stop_loss_level.to_string(),
            s.trade_count.to_string(),
            format!("{:.4}", s.win_rate),
            format!("{:.6}", s.mean_return_pct),
            format!("{:.6}", s.min_return_pct),
            format!("{:.6}", s.max_return_pct),
            format!("{:.4}", s.profit_factor),
            s.stop_loss_exits.to_string(),
            s.profit_target_exits.to_string(),
            s.forced_exits.to_string(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for one backtest.
///
/// Creates a directory named `{symbol}_{timestamp}/` under `output_dir`
/// containing:
/// - `manifest.json`: the full `BacktestResult`
/// - `trades.csv`: trade tape
/// - `summary.csv`: one row per grid combination
///
/// Returns the path to the created directory.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let dirname = format!(
        "{}_{}",
        result.symbol,
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    write_file(&run_dir.join("manifest.json"), &export_json(result)?)?;
    write_file(&run_dir.join("trades.csv"), &export_trades_csv(&result.trades)?)?;
    write_file(&run_dir.join("summary.csv"), &export_summary_csv(&result.summaries)?)?;

    tracing::info!(dir = %run_dir.display(), trades = result.trades.len(), "artifacts saved");
    Ok(run_dir)
}

/// Load a `BacktestResult` from an artifact directory's manifest.json.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let manifest_path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    import_json(&json)
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}
