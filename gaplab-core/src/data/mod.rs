//! Data ingestion: minute-bar text files into [`Bar`](crate::domain::Bar) values.

pub mod ingest;

pub use ingest::{load_bars_csv, read_bars_csv, CsvLayout, IngestError, IngestReport};
