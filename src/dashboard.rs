//! # Dashboard
//!
//! Read-only view over one loaded results file: portfolios, their derived
//! metrics, the efficient frontier and per-month drill-down.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::error::Result;
use crate::metrics::DerivedMetrics;
use crate::metrics::efficient_frontier;
use crate::metrics::monthly_concentration;
use crate::metrics::monthly_turnover;
use crate::metrics::summarize;
use crate::results::PortfolioId;
use crate::results::PortfolioResult;
use crate::results::PortfolioSet;
use crate::results::ResultsCache;
use crate::schema::ResultsSchema;

/// Allocation of one portfolio in one month.
#[derive(Clone, Debug, PartialEq)]
pub struct MonthlySnapshot {
  pub id: PortfolioId,
  /// 1-based month.
  pub month: usize,
  /// `(symbol, weight)` in schema order.
  pub weights: Vec<(String, f64)>,
  /// Turnover into this month, zero for month 1.
  pub turnover: f64,
  /// Herfindahl-Hirschman index of this month.
  pub concentration: f64,
}

/// Loaded results with their summary, shared with the presentation layer.
#[derive(Clone, Debug)]
pub struct Dashboard {
  results: Arc<PortfolioSet>,
  metrics: BTreeMap<PortfolioId, DerivedMetrics>,
  frontier: Vec<PortfolioId>,
}

impl Dashboard {
  /// Summarize an already loaded set over the schema horizon.
  pub fn new(results: Arc<PortfolioSet>) -> Result<Self> {
    let horizon = results.schema().horizon_months;
    let summary = summarize(results.as_ref(), horizon)?;
    let frontier = efficient_frontier(&summary);
    let metrics = summary.into_iter().map(|m| (m.id, m)).collect();

    Ok(Self {
      results,
      metrics,
      frontier,
    })
  }

  /// Load `path` through `cache`. A missing file is `Ok(None)`.
  pub fn open<P: AsRef<Path>>(cache: &ResultsCache, path: P) -> Result<Option<Self>> {
    let Some(results) = cache.get_or_load_optional(path.as_ref())? else {
      return Ok(None);
    };
    let dashboard = Self::new(results)?;
    info!(
      path = ?path.as_ref(),
      portfolios = dashboard.metrics.len(),
      frontier = dashboard.frontier.len(),
      "dashboard ready"
    );
    Ok(Some(dashboard))
  }

  pub fn schema(&self) -> &ResultsSchema {
    self.results.schema()
  }

  pub fn results(&self) -> &PortfolioSet {
    &self.results
  }

  /// Ids in ascending order.
  pub fn portfolio_ids(&self) -> Vec<PortfolioId> {
    self.results.ids()
  }

  pub fn portfolio_result(&self, id: PortfolioId) -> Option<&PortfolioResult> {
    self.results.get(id)
  }

  pub fn derived_metrics(&self, id: PortfolioId) -> Option<&DerivedMetrics> {
    self.metrics.get(&id)
  }

  /// Metrics of every portfolio, ascending by id.
  pub fn summary(&self) -> impl Iterator<Item = &DerivedMetrics> {
    self.metrics.values()
  }

  /// Frontier members in ascending risk order.
  pub fn efficient_frontier(&self) -> &[PortfolioId] {
    &self.frontier
  }

  pub fn is_efficient(&self, id: PortfolioId) -> bool {
    self.frontier.contains(&id)
  }

  /// Allocation of `id` in a 1-based `month`.
  pub fn monthly_snapshot(&self, id: PortfolioId, month: usize) -> Option<MonthlySnapshot> {
    let result = self.results.get(id)?;
    let row = result.weight_row(month)?;
    let weights = self
      .schema()
      .symbols()
      .zip(row.iter())
      .map(|(symbol, w)| (symbol.to_string(), *w))
      .collect();
    let turnover = monthly_turnover(result.weights())[month - 1];
    let concentration = monthly_concentration(result.weights())[month - 1];

    Some(MonthlySnapshot {
      id,
      month,
      weights,
      turnover,
      concentration,
    })
  }
}
