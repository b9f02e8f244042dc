//! # Result Types
//!
//! $$
//! W \in [0,1]^{T\times N},\quad \sum_{j} W_{tj} = 1
//! $$
//!
//! Strongly shaped, validated records for optimized portfolio trajectories.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::ArrayView2;
use ndarray::Axis;

use crate::error::LoadError;
use crate::error::Result;
use crate::schema::ResultsSchema;

/// Identifier of an optimized portfolio, the numeric suffix of its group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PortfolioId(pub u32);

impl fmt::Display for PortfolioId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl From<u32> for PortfolioId {
  fn from(id: u32) -> Self {
    Self(id)
  }
}

/// One optimized multi-period portfolio.
#[derive(Clone, Debug)]
pub struct PortfolioResult {
  /// `(months x assets)`, months chronological.
  weights: Array2<f64>,
  /// `(epochs x columns)`, column 0 is the epoch index.
  loss_history: Array2<f64>,
  achieved_wealth: f64,
  terminal_risk: f64,
}

impl PortfolioResult {
  /// Build a record from in-memory oriented arrays, enforcing every invariant
  /// of `schema`.
  pub fn try_new(
    id: PortfolioId,
    weights: Array2<f64>,
    loss_history: Array2<f64>,
    achieved_wealth: f64,
    terminal_risk: f64,
    schema: &ResultsSchema,
  ) -> Result<Self> {
    let expected = (schema.horizon_months, schema.n_assets());
    if weights.dim() != expected {
      return Err(LoadError::malformed(
        Some(id),
        "weights",
        format!("expected shape {:?}, got {:?}", expected, weights.dim()),
      ));
    }

    let tol = schema.weight_tolerance;
    for (t, row) in weights.axis_iter(Axis(0)).enumerate() {
      if let Some((j, w)) = row
        .iter()
        .enumerate()
        .find(|(_, w)| !w.is_finite() || **w < 0.0)
      {
        return Err(LoadError::malformed(
          Some(id),
          "weights",
          format!("month {} asset {} has invalid weight {w}", t + 1, j),
        ));
      }
      let sum = row.sum();
      if (sum - 1.0).abs() > tol {
        return Err(LoadError::malformed(
          Some(id),
          "weights",
          format!("month {} weights sum to {sum}, expected 1", t + 1),
        ));
      }
    }

    if loss_history.ncols() != schema.n_loss_columns() {
      return Err(LoadError::malformed(
        Some(id),
        "loss_history",
        format!(
          "expected {} columns, got {}",
          schema.n_loss_columns(),
          loss_history.ncols()
        ),
      ));
    }
    if loss_history.iter().any(|v| v.is_nan()) {
      return Err(LoadError::malformed(
        Some(id),
        "loss_history",
        "contains NaN",
      ));
    }
    let epochs = loss_history.column(0);
    if epochs.windows(2).into_iter().any(|w| w[1] < w[0]) {
      return Err(LoadError::malformed(
        Some(id),
        "loss_history",
        "epoch column is not ascending",
      ));
    }

    if !(achieved_wealth.is_finite() && achieved_wealth > 0.0) {
      return Err(LoadError::malformed(
        Some(id),
        "achieved_wealth",
        format!("expected a positive finite value, got {achieved_wealth}"),
      ));
    }
    if !(terminal_risk.is_finite() && terminal_risk >= 0.0) {
      return Err(LoadError::malformed(
        Some(id),
        "terminal_cCVaR",
        format!("expected a non-negative finite value, got {terminal_risk}"),
      ));
    }

    Ok(Self {
      weights,
      loss_history,
      achieved_wealth,
      terminal_risk,
    })
  }

  /// Weight trajectory, `(months x assets)`.
  pub fn weights(&self) -> ArrayView2<'_, f64> {
    self.weights.view()
  }

  pub fn n_months(&self) -> usize {
    self.weights.nrows()
  }

  /// Weights of a 1-based month.
  pub fn weight_row(&self, month: usize) -> Option<ArrayView1<'_, f64>> {
    if month == 0 || month > self.n_months() {
      return None;
    }
    Some(self.weights.row(month - 1))
  }

  /// Loss trajectory, `(epochs x columns)`.
  pub fn loss_history(&self) -> ArrayView2<'_, f64> {
    self.loss_history.view()
  }

  pub fn n_epochs(&self) -> usize {
    self.loss_history.nrows()
  }

  /// Epoch index column.
  pub fn epochs(&self) -> ArrayView1<'_, f64> {
    self.loss_history.column(0)
  }

  /// Loss column by position, `0` being the epoch index.
  pub fn loss_column(&self, idx: usize) -> Option<ArrayView1<'_, f64>> {
    (idx < self.loss_history.ncols()).then(|| self.loss_history.column(idx))
  }

  /// Terminal wealth multiplier, `1.0` is breakeven.
  pub fn achieved_wealth(&self) -> f64 {
    self.achieved_wealth
  }

  /// Terminal centered CVaR.
  pub fn terminal_risk(&self) -> f64 {
    self.terminal_risk
  }
}

/// Every portfolio of one results file, ascending by id.
#[derive(Clone, Debug)]
pub struct PortfolioSet {
  schema: Arc<ResultsSchema>,
  portfolios: BTreeMap<PortfolioId, PortfolioResult>,
}

impl PortfolioSet {
  pub fn new(
    schema: Arc<ResultsSchema>,
    portfolios: BTreeMap<PortfolioId, PortfolioResult>,
  ) -> Self {
    Self { schema, portfolios }
  }

  /// Schema the set was validated against.
  pub fn schema(&self) -> &ResultsSchema {
    &self.schema
  }

  pub fn len(&self) -> usize {
    self.portfolios.len()
  }

  pub fn is_empty(&self) -> bool {
    self.portfolios.is_empty()
  }

  /// Ids in ascending order.
  pub fn ids(&self) -> Vec<PortfolioId> {
    self.portfolios.keys().copied().collect()
  }

  pub fn get(&self, id: PortfolioId) -> Option<&PortfolioResult> {
    self.portfolios.get(&id)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&PortfolioId, &PortfolioResult)> {
    self.portfolios.iter()
  }
}

impl<'a> IntoIterator for &'a PortfolioSet {
  type Item = (&'a PortfolioId, &'a PortfolioResult);
  type IntoIter = std::collections::btree_map::Iter<'a, PortfolioId, PortfolioResult>;

  fn into_iter(self) -> Self::IntoIter {
    self.portfolios.iter()
  }
}
