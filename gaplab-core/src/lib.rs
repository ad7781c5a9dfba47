//! GapLab Core: bars, session aggregation, signal detection, trade simulation.
//!
//! This crate contains the whole evaluation engine and performs no I/O
//! outside of [`data`]:
//! - Domain types (bars, session windows, trades)
//! - Read-only minute-bar store with point and range lookups
//! - Daily session aggregates
//! - Two-stage gap-up signal detector
//! - Drawdown-entry trade simulator with configurable exit policies

pub mod aggregate;
pub mod data;
pub mod domain;
pub mod error;
pub mod series;
pub mod signal;
pub mod simulator;

pub use aggregate::{build_daily_aggregates, DailyAggregate, DailyAggregates, DayStepping};
pub use domain::{Bar, ExitReason, SessionWindow, Trade};
pub use error::{CoreError, Evaluation, SkipKind, SkipReason};
pub use series::TimeSeries;
pub use signal::{detect, find_signal, SignalEvent, SignalParams};
pub use simulator::{ExitPriority, ExitScope, RiskLevels, SimulationPolicy, TradeSimulator};
