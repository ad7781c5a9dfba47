//! Bar loading for the runner.
//!
//! Reads one symbol's minute bars from a CSV file, restricts them to the
//! configured date range and freezes them into a [`TimeSeries`]. The
//! dataset hash is computed on the frozen series so identical inputs
//! fingerprint identically regardless of row order or duplicates.

use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use thiserror::Error;

use gaplab_core::data::{load_bars_csv, read_bars_csv, CsvLayout, IngestError, IngestReport};
use gaplab_core::{Bar, CoreError, TimeSeries};

use crate::config::BacktestConfig;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("series error: {0}")]
    Series(#[from] CoreError),

    #[error("no bars for '{symbol}' in the requested date range")]
    Empty { symbol: String },
}

/// Options controlling how bars are loaded.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// Inclusive first date to keep.
    pub start: Option<NaiveDate>,
    /// Inclusive last date to keep.
    pub end: Option<NaiveDate>,
    pub layout: CsvLayout,
}

impl LoadOptions {
    pub fn from_config(config: &BacktestConfig) -> Self {
        Self {
            start: config.data.start_date,
            end: config.data.end_date,
            layout: CsvLayout {
                has_header: config.data.has_header,
            },
        }
    }

    fn keeps(&self, bar: &Bar) -> bool {
        let date = bar.timestamp.date();
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

/// A frozen series plus provenance counters.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub series: TimeSeries,
    /// BLAKE3 over every bar of the series.
    pub dataset_hash: String,
    pub source: Option<PathBuf>,
    pub rows_read: usize,
    pub duplicates_dropped: usize,
    pub rows_out_of_range: usize,
}

/// Load `symbol` from a CSV file.
pub fn load_series(path: &Path, symbol: &str, opts: &LoadOptions) -> Result<LoadedData, LoadError> {
    let report = load_bars_csv(path, opts.layout)?;
    let mut loaded = freeze(report, symbol, opts)?;
    loaded.source = Some(path.to_path_buf());
    Ok(loaded)
}

/// Load `symbol` from any reader; used for stdin and tests.
pub fn read_series<R: Read>(
    reader: R,
    symbol: &str,
    opts: &LoadOptions,
) -> Result<LoadedData, LoadError> {
    let report = read_bars_csv(reader, opts.layout)?;
    freeze(report, symbol, opts)
}

fn freeze(report: IngestReport, symbol: &str, opts: &LoadOptions) -> Result<LoadedData, LoadError> {
    let IngestReport {
        bars,
        rows_read,
        duplicates_dropped,
    } = report;

    let before = bars.len();
    let bars: Vec<Bar> = bars.into_iter().filter(|b| opts.keeps(b)).collect();
    let rows_out_of_range = before - bars.len();

    if bars.is_empty() {
        return Err(LoadError::Empty {
            symbol: symbol.to_string(),
        });
    }

    let series = TimeSeries::new(symbol, bars)?;
    let dataset_hash = series.fingerprint();

    tracing::info!(
        symbol,
        bars = series.len(),
        rows_read,
        duplicates_dropped,
        rows_out_of_range,
        "series loaded"
    );

    Ok(LoadedData {
        series,
        dataset_hash,
        source: None,
        rows_read,
        duplicates_dropped,
        rows_out_of_range,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "\
2024-01-03 09:31:00,101,101.5,100.8,101.2,1000
2024-01-02 16:00:00,100,100,100,100,500
2024-01-03 09:30:00,101,101,101,101,800
2024-01-04 09:30:00,102,102,102,102,700
2024-01-03 09:30:00,999,999,999,999,1
";

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn reads_sorts_and_dedupes() {
        let loaded = read_series(SAMPLE.as_bytes(), "AAPL", &LoadOptions::default()).unwrap();
        assert_eq!(loaded.series.len(), 4);
        assert_eq!(loaded.rows_read, 5);
        assert_eq!(loaded.duplicates_dropped, 1);
        assert_eq!(loaded.rows_out_of_range, 0);
        assert_eq!(loaded.series.symbol(), "AAPL");
        // First occurrence of the duplicate wins.
        let first_open = loaded
            .series
            .get(date(3).and_hms_opt(9, 30, 0).unwrap())
            .unwrap();
        assert_eq!(first_open.close, 101.0);
    }

    #[test]
    fn date_range_is_inclusive() {
        let opts = LoadOptions {
            start: Some(date(3)),
            end: Some(date(3)),
            ..LoadOptions::default()
        };
        let loaded = read_series(SAMPLE.as_bytes(), "AAPL", &opts).unwrap();
        assert_eq!(loaded.series.len(), 2);
        assert_eq!(loaded.rows_out_of_range, 2);
        assert!(loaded.series.bars().iter().all(|b| b.timestamp.date() == date(3)));
    }

    #[test]
    fn empty_range_is_an_error() {
        let opts = LoadOptions {
            start: Some(date(10)),
            ..LoadOptions::default()
        };
        let err = read_series(SAMPLE.as_bytes(), "AAPL", &opts).unwrap_err();
        assert!(matches!(err, LoadError::Empty { .. }));
    }

    #[test]
    fn dataset_hash_follows_surviving_bars() {
        let reordered: String = SAMPLE.lines().rev().map(|l| format!("{l}\n")).collect();
        let a = read_series(SAMPLE.as_bytes(), "AAPL", &LoadOptions::default()).unwrap();
        let b = read_series(reordered.as_bytes(), "AAPL", &LoadOptions::default()).unwrap();
        // The reversed file keeps the 999 duplicate instead, so compare
        // only after removing it.
        let cleaned: String = SAMPLE
            .lines()
            .filter(|l| !l.contains("999"))
            .map(|l| format!("{l}\n"))
            .collect();
        let c = read_series(cleaned.as_bytes(), "AAPL", &LoadOptions::default()).unwrap();
        assert_eq!(a.dataset_hash, c.dataset_hash);
        assert_ne!(a.dataset_hash, b.dataset_hash);
    }

    #[test]
    fn load_series_records_source_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let loaded = load_series(file.path(), "AAPL", &LoadOptions::default()).unwrap();
        assert_eq!(loaded.source.as_deref(), Some(file.path()));
        assert_eq!(loaded.series.len(), 4);
    }

    #[test]
    fn config_maps_to_options() {
        let mut config = BacktestConfig::default();
        config.data.start_date = Some(date(2));
        config.data.has_header = true;
        let opts = LoadOptions::from_config(&config);
        assert_eq!(opts.start, Some(date(2)));
        assert_eq!(opts.end, None);
        assert!(opts.layout.has_header);
    }
}
