//! GapLab CLI: grid backtests and signal listings over minute-bar CSVs.
//!
//! Commands:
//! - `run`: sweep the (drawdown, stop-loss) grid and save artifacts
//! - `signals`: list the gap-up days that passed confirmation

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use gaplab_core::DailyAggregates;
use gaplab_runner::{
    load_series, run_single_backtest, save_artifacts, BacktestConfig, BacktestResult, GridRunner,
    LoadOptions,
};

#[derive(Parser)]
#[command(
    name = "gaplab",
    about = "GapLab CLI: gap-up drawdown-entry intraday backtester"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command.
#[derive(clap::Args)]
struct DataArgs {
    /// Minute-bar CSV (datetime,open,high,low,close,volume). Defaults to [data].path.
    #[arg(long)]
    data: Option<PathBuf>,

    /// Path to a TOML config file. Built-in defaults when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Symbol label for the loaded bars.
    #[arg(long)]
    symbol: Option<String>,

    /// First date to keep (YYYY-MM-DD).
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Last date to keep (YYYY-MM-DD).
    #[arg(long)]
    end: Option<NaiveDate>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sweep the parameter grid and save trades, summaries and a manifest.
    Run {
        #[command(flatten)]
        args: DataArgs,

        /// Output directory for artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Evaluate combinations one at a time instead of on the thread pool.
        #[arg(long, default_value_t = false)]
        sequential: bool,
    },
    /// List the days that produced a confirmed gap-up signal.
    Signals {
        #[command(flatten)]
        args: DataArgs,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            args,
            output_dir,
            sequential,
        } => run_backtest_cmd(args, output_dir, sequential),
        Commands::Signals { args } => run_signals_cmd(args),
    }
}

/// Config file (or defaults) with command-line flags applied on top.
fn resolve_config(args: &DataArgs) -> Result<BacktestConfig> {
    let mut config = match &args.config {
        Some(path) => BacktestConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => BacktestConfig::default(),
    };
    if let Some(data) = &args.data {
        config.data.path = Some(data.clone());
    }
    if let Some(symbol) = &args.symbol {
        config.data.symbol = symbol.clone();
    }
    if args.start.is_some() {
        config.data.start_date = args.start;
    }
    if args.end.is_some() {
        config.data.end_date = args.end;
    }
    config.validate()?;
    Ok(config)
}

fn run_backtest_cmd(args: DataArgs, output_dir: PathBuf, sequential: bool) -> Result<()> {
    let mut config = resolve_config(&args)?;
    if sequential {
        config.run.parallel = false;
    }
    tracing::info!(
        symbol = %config.data.symbol,
        combinations = config.grid.size(),
        config_hash = %config.config_hash(),
        "resolved configuration"
    );

    let result = run_single_backtest(&config, None, None)?;
    print_summary(&result);

    let run_dir = save_artifacts(&result, &output_dir)?;
    println!("Artifacts saved to: {}", run_dir.display());

    Ok(())
}

fn run_signals_cmd(args: DataArgs) -> Result<()> {
    let config = resolve_config(&args)?;
    let path = config
        .data
        .path
        .as_deref()
        .context("no data file given (set [data].path or pass --data)")?;
    let loaded = load_series(path, &config.data.symbol, &LoadOptions::from_config(&config))?;

    let runner = GridRunner::from_config(&config);
    let aggregates = DailyAggregates::build(&loaded.series, runner.session());
    let scan = runner.scan_signals(&loaded.series, &aggregates)?;

    println!();
    println!(
        "{:<12} {:>12} {:>12} {:>8} {:>12}",
        "Day", "Prior Close", "Open", "Gap %", "Signal"
    );
    for s in &scan.signals {
        println!(
            "{:<12} {:>12.4} {:>12.4} {:>8.3} {:>12.4}",
            s.day.to_string(),
            s.prior_close,
            s.day_open,
            (s.day_open / s.prior_close - 1.0) * 100.0,
            s.signal_price
        );
    }
    println!();
    println!("Days:    {}", scan.candidate_days);
    println!("Signals: {}", scan.signals.len());
    for (reason, count) in &scan.skips {
        println!("  skipped ({reason:?}): {count}");
    }
    Ok(())
}

fn print_summary(result: &BacktestResult) {
    println!();
    println!("=== Grid Backtest Result ===");
    println!("Symbol:         {}", result.symbol);
    println!(
        "Period:         {} to {}",
        result.start_date, result.end_date
    );
    println!("Bars:           {}", result.bar_count);
    println!("Session days:   {}", result.stats.candidate_days);
    println!("Signals:        {}", result.stats.signals);
    println!("Trades:         {}", result.stats.trades);
    println!();
    println!("--- Per Combination ---");
    println!(
        "{:>6} {:>6} {:>7} {:>8} {:>9} {:>9} {:>9} {:>5} {:>5} {:>5}",
        "DD %", "SL %", "Trades", "Win %", "Mean %", "Min %", "Max %", "Stop", "Tgt", "Fcd"
    );
    for s in &result.summaries {
        println!(
            "{:>6.2} {:>6.2} {:>7} {:>8.1} {:>9.3} {:>9.3} {:>9.3} {:>5} {:>5} {:>5}",
            s.drawdown_level,
            s.stop_loss_level,
            s.trade_count,
            s.win_rate * 100.0,
            s.mean_return_pct,
            s.min_return_pct,
            s.max_return_pct,
            s.stop_loss_exits,
            s.profit_target_exits,
            s.forced_exits
        );
    }
    if result.cancelled {
        println!();
        println!("WARNING: sweep was cancelled; results are partial");
    }
    println!();
}
