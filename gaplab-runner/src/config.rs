//! TOML backtest configuration.
//!
//! Every section is optional and defaults to the rule's historical
//! constants: 09:30–16:00 session, 11:15 confirmation, 0.5% gap, drawdown
//! levels 0.25–1.0% and stop-loss levels 0.5–2.0%.
//!
//! Example:
//! ```toml
//! [data]
//! symbol = "AAPL"
//! path = "AAPL_full_1min_UNADJUSTED.txt"
//! start_date = "2020-01-01"
//!
//! [signal]
//! confirmation_time = "11:15"
//! gap_threshold = 0.005
//!
//! [grid]
//! drawdown_levels = [0.25, 0.5, 0.75, 1.0]
//! stop_loss_levels = [0.5, 1.0, 1.5, 2.0]
//! ```

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use gaplab_core::{
    CoreError, ExitPriority, ExitScope, SessionWindow, SignalParams, SimulationPolicy,
};

use crate::grid::ParamGrid;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Session(#[from] CoreError),

    #[error("confirmation time {time} is outside the session {open}–{close}")]
    ConfirmationOutsideSession {
        time: NaiveTime,
        open: NaiveTime,
        close: NaiveTime,
    },

    #[error("gap threshold must be a finite, non-negative fraction (got {0})")]
    InvalidGapThreshold(f64),

    #[error("{0} must not be empty")]
    EmptyLevels(&'static str),

    #[error("{name} contains {value}; levels are percentages in [0, 100)")]
    InvalidLevel { name: &'static str, value: f64 },

    #[error("{name} lists {value} more than once")]
    DuplicateLevel { name: &'static str, value: f64 },

    #[error("start date {start} is after end date {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
}

/// Where the bars come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub symbol: String,
    pub path: Option<PathBuf>,
    /// Inclusive lower date bound applied after loading.
    pub start_date: Option<NaiveDate>,
    /// Inclusive upper date bound applied after loading.
    pub end_date: Option<NaiveDate>,
    pub has_header: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            symbol: "AAPL".into(),
            path: None,
            start_date: None,
            end_date: None,
            has_header: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitConfig {
    pub priority: ExitPriority,
    pub scope: ExitScope,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Evaluate grid combinations on the rayon pool.
    pub parallel: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self { parallel: true }
    }
}

/// Full configuration for one grid backtest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub data: DataConfig,
    pub session: SessionWindow,
    pub signal: SignalParams,
    pub grid: ParamGrid,
    pub exit: ExitConfig,
    pub run: RunSettings,
}

impl BacktestConfig {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let session = SessionWindow::new(self.session.open(), self.session.close())?;

        let confirmation = self.signal.confirmation_time;
        if !session.contains(confirmation) {
            return Err(ConfigError::ConfirmationOutsideSession {
                time: confirmation,
                open: session.open(),
                close: session.close(),
            });
        }

        let gap = self.signal.gap_threshold;
        if !gap.is_finite() || gap < 0.0 {
            return Err(ConfigError::InvalidGapThreshold(gap));
        }

        check_levels("drawdown_levels", &self.grid.drawdown_levels)?;
        check_levels("stop_loss_levels", &self.grid.stop_loss_levels)?;

        if let (Some(start), Some(end)) = (self.data.start_date, self.data.end_date) {
            if start > end {
                return Err(ConfigError::InvalidDateRange { start, end });
            }
        }

        Ok(())
    }

    /// Policies shared by every grid combination.
    pub fn simulation_policy(&self) -> SimulationPolicy {
        SimulationPolicy {
            session: self.session,
            day_stepping: self.signal.day_stepping,
            exit_priority: self.exit.priority,
            exit_scope: self.exit.scope,
        }
    }

    /// Deterministic BLAKE3 hash of the strategy parameters.
    ///
    /// The data path is excluded so that the same sweep over a moved file
    /// hashes identically; the dataset has its own fingerprint.
    pub fn config_hash(&self) -> String {
        let mut hashed = self.clone();
        hashed.data.path = None;
        let json = serde_json::to_vec(&hashed).unwrap_or_default();
        blake3::hash(&json).to_hex().to_string()
    }
}

fn check_levels(name: &'static str, levels: &[f64]) -> Result<(), ConfigError> {
    if levels.is_empty() {
        return Err(ConfigError::EmptyLevels(name));
    }
    if let Some(&value) = levels
        .iter()
        .find(|v| !v.is_finite() || **v < 0.0 || **v >= 100.0)
    {
        return Err(ConfigError::InvalidLevel { name, value });
    }
    let mut sorted = levels.to_vec();
    sorted.sort_by(f64::total_cmp);
    if let Some(pair) = sorted.windows(2).find(|w| w[0] == w[1]) {
        return Err(ConfigError::DuplicateLevel {
            name,
            value: pair[0],
        });
    }
    Ok(())
}
