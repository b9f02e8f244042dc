//! # Results Schema
//!
//! Column vocabularies and layout constants for results archives. The archive
//! carries no column labels, so names are bound to positions from here and
//! checked against array widths at load time.

use crate::error::LoadError;
use crate::error::Result;

/// Bumped whenever a vocabulary below changes order or length.
pub const SCHEMA_VERSION: u32 = 1;

/// Default group prefix, groups are named `point_<N>`.
pub const DEFAULT_GROUP_PREFIX: &str = "point";

/// Months in the optimization horizon.
pub const DEFAULT_HORIZON_MONTHS: usize = 60;

/// Tolerance for the per-month weight invariants.
pub const DEFAULT_WEIGHT_TOLERANCE: f64 = 1e-6;

/// Name of the leading loss-history column.
pub const EPOCH_COLUMN: &str = "epoch";

/// ETF universe in on-disk row order `(symbol, display name)`.
pub const ETF_UNIVERSE: [(&str, &str); 13] = [
  ("SPY", "SPDR S&P 500 ETF Trust (US Large Cap)"),
  ("IWM", "iShares Russell 2000 ETF (US Small Cap)"),
  ("DBEF", "Xtrackers MSCI EAFE Hedged Equity ETF (Dev. Intl)"),
  ("DBEZ", "Xtrackers MSCI Emerging Markets Hedged ETF (EM)"),
  ("VNQ", "Vanguard Real Estate ETF (US REIT)"),
  ("GLD", "SPDR Gold Shares (Gold)"),
  ("DBA", "Invesco DB Agriculture Fund (Agriculture)"),
  ("SHY", "iShares 1-3 Year Treasury Bond ETF (Short Gov)"),
  ("IEI", "iShares 3-7 Year Treasury Bond ETF (Short-Mid Gov)"),
  ("IEF", "iShares 7-10 Year Treasury Bond ETF (Mid Gov)"),
  ("TLT", "iShares 20+ Year Treasury Bond ETF (Long Gov)"),
  ("LQD", "iShares iBoxx $ Inv. Grade Corp. Bond ETF (IG Corp)"),
  ("HYG", "iShares iBoxx $ High Yield Corp. Bond ETF (HY Corp)"),
];

/// Loss-history columns in on-disk row order, epoch first.
pub const LOSS_HISTORY_COLUMNS: [&str; 8] = [
  EPOCH_COLUMN,
  "total_loss",
  "risk_target",
  "turnover_penalty",
  "anchor_penalty",
  "wealth_penalty",
  "lower_bound_penalty",
  "monthly_risk_penalty",
];

/// Asset symbol with its human readable name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetMeta {
  pub symbol: String,
  pub name: String,
}

impl AssetMeta {
  pub fn new(symbol: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      symbol: symbol.into(),
      name: name.into(),
    }
  }
}

/// Layout of a results archive.
#[derive(Clone, Debug)]
pub struct ResultsSchema {
  /// Vocabulary version, see [`SCHEMA_VERSION`].
  pub version: u32,
  /// Prefix of portfolio groups (`<prefix>_<N>`).
  pub group_prefix: String,
  /// Assets bound to weight rows on disk.
  pub assets: Vec<AssetMeta>,
  /// Loss-history columns bound to rows on disk, epoch first.
  pub loss_columns: Vec<String>,
  /// Months per trajectory.
  pub horizon_months: usize,
  /// Allowed deviation of a weight row sum from one.
  pub weight_tolerance: f64,
}

impl Default for ResultsSchema {
  fn default() -> Self {
    Self {
      version: SCHEMA_VERSION,
      group_prefix: DEFAULT_GROUP_PREFIX.to_string(),
      assets: ETF_UNIVERSE
        .iter()
        .map(|(symbol, name)| AssetMeta::new(*symbol, *name))
        .collect(),
      loss_columns: LOSS_HISTORY_COLUMNS.iter().map(|c| c.to_string()).collect(),
      horizon_months: DEFAULT_HORIZON_MONTHS,
      weight_tolerance: DEFAULT_WEIGHT_TOLERANCE,
    }
  }
}

impl ResultsSchema {
  /// Default loss vocabulary with a custom asset list and horizon.
  pub fn with_assets<S: AsRef<str>>(symbols: &[S], horizon_months: usize) -> Self {
    Self {
      assets: symbols
        .iter()
        .map(|s| AssetMeta::new(s.as_ref(), s.as_ref()))
        .collect(),
      horizon_months,
      ..Self::default()
    }
  }

  pub fn n_assets(&self) -> usize {
    self.assets.len()
  }

  pub fn n_loss_columns(&self) -> usize {
    self.loss_columns.len()
  }

  /// Asset symbols in column order.
  pub fn symbols(&self) -> impl Iterator<Item = &str> {
    self.assets.iter().map(|a| a.symbol.as_str())
  }

  /// Display name for `symbol`, falling back to the symbol itself.
  pub fn display_name<'a>(&'a self, symbol: &'a str) -> &'a str {
    self
      .assets
      .iter()
      .find(|a| a.symbol == symbol)
      .map_or(symbol, |a| a.name.as_str())
  }

  /// Position of a loss column by name.
  pub fn loss_column_index(&self, name: &str) -> Option<usize> {
    self.loss_columns.iter().position(|c| c == name)
  }

  /// Reject vocabularies and horizons no archive could satisfy.
  pub fn validate(&self) -> Result<()> {
    if self.horizon_months == 0 {
      return Err(LoadError::configuration("horizon_months must be > 0"));
    }
    if self.assets.is_empty() {
      return Err(LoadError::configuration("asset vocabulary is empty"));
    }
    if self.loss_columns.len() < 2 {
      return Err(LoadError::configuration(
        "loss vocabulary needs the epoch column and at least one loss component",
      ));
    }
    if self.loss_columns[0] != EPOCH_COLUMN {
      return Err(LoadError::configuration(format!(
        "first loss column must be '{EPOCH_COLUMN}', got '{}'",
        self.loss_columns[0]
      )));
    }
    if self.group_prefix.is_empty() {
      return Err(LoadError::configuration("group_prefix is empty"));
    }
    if !(self.weight_tolerance.is_finite() && self.weight_tolerance >= 0.0) {
      return Err(LoadError::configuration(
        "weight_tolerance must be finite and non-negative",
      ));
    }
    for (i, asset) in self.assets.iter().enumerate() {
      if self.assets[..i].iter().any(|a| a.symbol == asset.symbol) {
        return Err(LoadError::configuration(format!(
          "duplicate asset symbol '{}'",
          asset.symbol
        )));
      }
    }
    Ok(())
  }
}
