//! # Results
//!
//! $$
//! \text{archive} \mapsto \{\,\text{id} \mapsto (W, L, V_T, \mathrm{cCVaR}_T)\,\}
//! $$
//!
//! Loading, validation and caching of precomputed optimization results.

pub mod cache;
pub mod loader;
pub mod types;

pub use cache::ResultsCache;
pub use loader::ResultsLoader;
pub use loader::load;
pub use types::PortfolioId;
pub use types::PortfolioResult;
pub use types::PortfolioSet;
