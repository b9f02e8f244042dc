//! Synthetic results archives for tests.

use std::fs::File;
use std::io::Seek;
use std::io::Write;
use std::path::Path;

use ndarray::Array0;
use ndarray::Array2;
use ndarray_npy::NpzWriter;

/// One portfolio group in on-disk orientation.
#[derive(Clone, Debug)]
pub(crate) struct FixturePortfolio {
  pub id: u32,
  /// `(assets x months)`.
  pub weights: Array2<f64>,
  /// `(columns x epochs)`, row 0 holds the epoch index.
  pub loss_history: Array2<f64>,
  pub achieved_wealth: f64,
  pub terminal_risk: f64,
}

impl FixturePortfolio {
  pub fn new(
    id: u32,
    weights: Array2<f64>,
    loss_history: Array2<f64>,
    achieved_wealth: f64,
    terminal_risk: f64,
  ) -> Self {
    Self {
      id,
      weights,
      loss_history,
      achieved_wealth,
      terminal_risk,
    }
  }

  /// Same weights every month, given per asset.
  pub fn constant(
    id: u32,
    per_asset: &[f64],
    months: usize,
    achieved_wealth: f64,
    terminal_risk: f64,
  ) -> Self {
    let weights = Array2::from_shape_fn((per_asset.len(), months), |(a, _)| per_asset[a]);
    Self::new(
      id,
      weights,
      Self::loss_on_disk(8, 3),
      achieved_wealth,
      terminal_risk,
    )
  }

  /// Loss history with a 1-based epoch row and decaying components.
  pub fn loss_on_disk(columns: usize, epochs: usize) -> Array2<f64> {
    Array2::from_shape_fn((columns, epochs), |(c, e)| {
      if c == 0 {
        (e + 1) as f64
      } else {
        c as f64 * 10.0 / (e + 1) as f64
      }
    })
  }

  pub fn add_to<W: Write + Seek>(&self, npz: &mut NpzWriter<W>, prefix: &str) {
    let group = format!("{prefix}_{}", self.id);
    npz
      .add_array(format!("{group}/weights.npy"), &self.weights)
      .unwrap();
    npz
      .add_array(format!("{group}/loss_history.npy"), &self.loss_history)
      .unwrap();
    npz
      .add_array(
        format!("{group}/achieved_wealth.npy"),
        &Array0::from_elem((), self.achieved_wealth),
      )
      .unwrap();
    npz
      .add_array(
        format!("{group}/terminal_cCVaR.npy"),
        &Array0::from_elem((), self.terminal_risk),
      )
      .unwrap();
  }
}

pub(crate) fn write_archive(path: &Path, prefix: &str, portfolios: &[FixturePortfolio]) {
  let mut npz = NpzWriter::new(File::create(path).unwrap());
  for portfolio in portfolios {
    portfolio.add_to(&mut npz, prefix);
  }
  npz.finish().unwrap();
}
