//! # portfolio-dashboard
//!
//! $$
//! \text{results archive} \to \{W_t, L_e, V_T, \mathrm{cCVaR}_T\}_p \to (r_a, \sigma_a, \bar\tau, \overline{\mathrm{HHI}})_p \to \text{frontier}
//! $$
//!
//! Loads precomputed multi-period portfolio optimization results, derives
//! summary risk/return statistics and renders the dashboard figures.

pub mod dashboard;
pub mod error;
pub mod metrics;
pub mod results;
pub mod schema;
pub mod visualization;

#[cfg(test)]
pub(crate) mod fixtures;

pub use dashboard::Dashboard;
pub use dashboard::MonthlySnapshot;
pub use error::LoadError;
pub use error::Result;
pub use metrics::DerivedMetrics;
pub use metrics::efficient_frontier;
pub use metrics::summarize;
pub use results::PortfolioId;
pub use results::PortfolioResult;
pub use results::PortfolioSet;
pub use results::ResultsCache;
pub use results::ResultsLoader;
pub use schema::ResultsSchema;
