//! CSV ingestion for minute bars.
//!
//! The native layout is the vendor's headerless text export:
//!
//! ```text
//! 2020-01-02 09:30:00,74.06,74.11,73.99,74.05,291624
//! ```
//!
//! Rows are sorted by timestamp after reading. A repeated timestamp keeps the
//! first row seen. Any malformed row is a hard error naming its line.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::domain::Bar;

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%m/%d/%Y %H:%M",
];

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("line {line}: expected 6 fields (datetime,open,high,low,close,volume), found {found}")]
    FieldCount { line: u64, found: usize },

    #[error("line {line}: unparseable timestamp '{value}'")]
    Timestamp { line: u64, value: String },

    #[error("line {line}: unparseable {field} '{value}'")]
    Number {
        line: u64,
        field: &'static str,
        value: String,
    },

    #[error("line {line}: prices must be finite, positive and inside [low, high]")]
    InsaneBar { line: u64 },
}

/// Column layout of the input file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CsvLayout {
    /// First row is a header and is skipped.
    pub has_header: bool,
}

/// Bars read from a file plus what was dropped on the way.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub bars: Vec<Bar>,
    pub rows_read: usize,
    pub duplicates_dropped: usize,
}

/// Read bars from any reader, then sort and de-duplicate them.
pub fn read_bars_csv<R: Read>(reader: R, layout: CsvLayout) -> Result<IngestReport, IngestError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(layout.has_header)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut bars = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        bars.push(parse_record(&record, line)?);
    }

    let rows_read = bars.len();
    bars.sort_by_key(|b| b.timestamp);
    bars.dedup_by_key(|b| b.timestamp);
    let duplicates_dropped = rows_read - bars.len();
    if duplicates_dropped > 0 {
        tracing::warn!(duplicates_dropped, "dropped bars with repeated timestamps");
    }

    Ok(IngestReport {
        bars,
        rows_read,
        duplicates_dropped,
    })
}

/// Open `path` and read it with [`read_bars_csv`].
pub fn load_bars_csv(path: &Path, layout: CsvLayout) -> Result<IngestReport, IngestError> {
    let file = File::open(path).map_err(|source| IngestError::Open {
        path: path.display().to_string(),
        source,
    })?;
    let report = read_bars_csv(file, layout)?;
    tracing::info!(
        path = %path.display(),
        bars = report.bars.len(),
        "loaded minute bars"
    );
    Ok(report)
}

fn parse_record(record: &csv::StringRecord, line: u64) -> Result<Bar, IngestError> {
    if record.len() != 6 {
        return Err(IngestError::FieldCount {
            line,
            found: record.len(),
        });
    }
    let field = |i: usize| record.get(i).unwrap_or_default();

    let timestamp = parse_timestamp(field(0)).ok_or_else(|| IngestError::Timestamp {
        line,
        value: field(0).to_string(),
    })?;

    let price = |i: usize, name: &'static str| -> Result<f64, IngestError> {
        field(i).parse::<f64>().map_err(|_| IngestError::Number {
            line,
            field: name,
            value: field(i).to_string(),
        })
    };

    let bar = Bar {
        timestamp,
        open: price(1, "open")?,
        high: price(2, "high")?,
        low: price(3, "low")?,
        close: price(4, "close")?,
        volume: parse_volume(field(5)).ok_or_else(|| IngestError::Number {
            line,
            field: "volume",
            value: field(5).to_string(),
        })?,
    };
    if !bar.is_sane() {
        return Err(IngestError::InsaneBar { line });
    }
    Ok(bar)
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

// Some vendors export volume as a float ("291624.0").
fn parse_volume(s: &str) -> Option<u64> {
    s.parse::<u64>().ok().or_else(|| {
        s.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| v.round() as u64)
    })
}
