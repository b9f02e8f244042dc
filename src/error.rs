//! # Errors
//!
//! Failure taxonomy for loading and summarizing optimization results.

use std::path::PathBuf;

use thiserror::Error;

use crate::results::PortfolioId;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LoadError>;

/// Errors raised while loading a results file or deriving metrics from it.
#[derive(Debug, Error)]
pub enum LoadError {
  /// The results file does not exist. Callers treat this as "no data".
  #[error("results file not found: {path:?}")]
  NotFound { path: PathBuf },

  /// The file exists but could not be read.
  #[error("failed to read results file {path:?}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// The file is not a readable array archive.
  #[error("results file {path:?} is not a readable archive: {message}")]
  Archive { path: PathBuf, message: String },

  /// A group is missing a member, has the wrong shape or holds bad values.
  #[error("malformed data in {}, field '{field}': {reason}", portfolio_label(.portfolio))]
  MalformedData {
    portfolio: Option<PortfolioId>,
    field: String,
    reason: String,
  },

  /// Invalid schema or horizon supplied by the host application.
  #[error("configuration error: {message}")]
  Configuration { message: String },
}

fn portfolio_label(portfolio: &Option<PortfolioId>) -> String {
  match portfolio {
    Some(id) => format!("portfolio {id}"),
    None => "archive".to_string(),
  }
}

impl LoadError {
  pub(crate) fn malformed(
    portfolio: Option<PortfolioId>,
    field: impl Into<String>,
    reason: impl Into<String>,
  ) -> Self {
    Self::MalformedData {
      portfolio,
      field: field.into(),
      reason: reason.into(),
    }
  }

  pub(crate) fn configuration(message: impl Into<String>) -> Self {
    Self::Configuration {
      message: message.into(),
    }
  }

  /// `true` for the recoverable "file does not exist" outcome.
  pub fn is_not_found(&self) -> bool {
    matches!(self, Self::NotFound { .. })
  }
}
