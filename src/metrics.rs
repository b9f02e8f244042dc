//! # Metrics
//!
//! $$
//! r_a = V_T^{12/T} - 1,\qquad
//! \sigma_a = \frac{\mathrm{cCVaR}_T}{\sqrt{T/12}},\qquad
//! \tau_t = \tfrac12 \lVert w_t - w_{t-1} \rVert_1,\qquad
//! \mathrm{HHI}_t = \sum_j w_{tj}^2
//! $$
//!
//! Summary statistics per portfolio and the efficient subset over them.

use ndarray::Array1;
use ndarray::ArrayView2;
use ndarray::Axis;
use ordered_float::OrderedFloat;
use tracing::debug;

use crate::error::LoadError;
use crate::error::Result;
use crate::results::PortfolioId;
use crate::results::PortfolioResult;

/// Derived statistics of one portfolio.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DerivedMetrics {
  pub id: PortfolioId,
  /// Terminal wealth multiplier the metrics were derived from.
  pub achieved_wealth: f64,
  /// Terminal cCVaR the metrics were derived from.
  pub terminal_risk: f64,
  pub annualized_return: f64,
  pub annualized_risk: f64,
  /// Mean monthly turnover, month 1 counted as zero.
  pub average_turnover: f64,
  /// Mean monthly Herfindahl-Hirschman index.
  pub average_concentration: f64,
}

fn check_horizon(horizon_months: usize) -> Result<()> {
  if horizon_months == 0 {
    return Err(LoadError::configuration("horizon_months must be > 0"));
  }
  Ok(())
}

/// Geometric annualization of a terminal wealth multiplier.
pub fn annualized_return(achieved_wealth: f64, horizon_months: usize) -> f64 {
  achieved_wealth.powf(12.0 / horizon_months as f64) - 1.0
}

/// Square-root-of-time annualization of terminal risk.
pub fn annualized_risk(terminal_risk: f64, horizon_months: usize) -> f64 {
  terminal_risk / (horizon_months as f64 / 12.0).sqrt()
}

/// Half the L1 distance between consecutive months. Month 1 has no prior
/// month and is exactly zero.
pub fn monthly_turnover(weights: ArrayView2<'_, f64>) -> Array1<f64> {
  let mut turnover = Array1::zeros(weights.nrows());
  for t in 1..weights.nrows() {
    let prev = weights.row(t - 1);
    let curr = weights.row(t);
    turnover[t] = 0.5
      * curr
        .iter()
        .zip(prev.iter())
        .map(|(c, p)| (c - p).abs())
        .sum::<f64>();
  }
  turnover
}

/// Herfindahl-Hirschman index of every month.
pub fn monthly_concentration(weights: ArrayView2<'_, f64>) -> Array1<f64> {
  weights.map_axis(Axis(1), |row| row.iter().map(|w| w * w).sum())
}

fn mean(xs: &Array1<f64>) -> f64 {
  xs.mean().unwrap_or(0.0)
}

/// Metrics of a single portfolio.
pub fn derive(id: PortfolioId, result: &PortfolioResult, horizon_months: usize) -> Result<DerivedMetrics> {
  check_horizon(horizon_months)?;
  let weights = result.weights();
  Ok(DerivedMetrics {
    id,
    achieved_wealth: result.achieved_wealth(),
    terminal_risk: result.terminal_risk(),
    annualized_return: annualized_return(result.achieved_wealth(), horizon_months),
    annualized_risk: annualized_risk(result.terminal_risk(), horizon_months),
    average_turnover: mean(&monthly_turnover(weights)),
    average_concentration: mean(&monthly_concentration(weights)),
  })
}

/// Metrics of every portfolio, in iteration order of `results`.
///
/// Empty input gives an empty summary; a zero horizon is a configuration error.
pub fn summarize<'a, I>(results: I, horizon_months: usize) -> Result<Vec<DerivedMetrics>>
where
  I: IntoIterator<Item = (&'a PortfolioId, &'a PortfolioResult)>,
{
  check_horizon(horizon_months)?;
  results
    .into_iter()
    .map(|(id, result)| derive(*id, result, horizon_months))
    .collect()
}

/// Efficient subset in ascending risk order.
///
/// Portfolios are stably sorted by annualized risk and scanned keeping the
/// running maximum return; a portfolio is kept iff its return is at least that
/// maximum. Equal-risk points that each reach the running maximum are all kept.
pub fn efficient_frontier(metrics: &[DerivedMetrics]) -> Vec<PortfolioId> {
  let mut by_risk: Vec<&DerivedMetrics> = metrics.iter().collect();
  by_risk.sort_by_key(|m| OrderedFloat(m.annualized_risk));

  let mut frontier: Vec<&DerivedMetrics> = Vec::new();
  let mut running_max = f64::NEG_INFINITY;
  for m in by_risk {
    if m.annualized_return < running_max {
      continue;
    }
    running_max = m.annualized_return;
    frontier.push(m);
  }

  debug!(
    portfolios = metrics.len(),
    frontier = frontier.len(),
    "computed efficient frontier"
  );
  frontier.into_iter().map(|m| m.id).collect()
}
