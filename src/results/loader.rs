//! # Results Loader
//!
//! $$
//! W^{\text{disk}} \in \mathbb R^{N\times T} \mapsto W = (W^{\text{disk}})^\top \in \mathbb R^{T\times N}
//! $$
//!
//! Reads a `.npz` results archive into a [`PortfolioSet`]. Groups are path
//! prefixes `<prefix>_<N>/` holding `weights`, `loss_history`,
//! `achieved_wealth` and `terminal_cCVaR`. Both 2-D arrays are stored with the
//! opposite orientation to the in-memory model and are transposed here after an
//! explicit shape check.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufReader;
use std::io::ErrorKind;
use std::io::Read;
use std::io::Seek;
use std::path::Path;
use std::sync::Arc;

use ndarray::Array2;
use ndarray::ArrayD;
use ndarray::Ix2;
use ndarray::IxDyn;
use ndarray::OwnedRepr;
use ndarray_npy::NpzReader;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::types::PortfolioId;
use super::types::PortfolioResult;
use super::types::PortfolioSet;
use crate::error::LoadError;
use crate::error::Result;
use crate::schema::ResultsSchema;

pub const WEIGHTS_MEMBER: &str = "weights";
pub const LOSS_HISTORY_MEMBER: &str = "loss_history";
pub const ACHIEVED_WEALTH_MEMBER: &str = "achieved_wealth";
pub const TERMINAL_RISK_MEMBER: &str = "terminal_cCVaR";

const REQUIRED_MEMBERS: [&str; 4] = [
  WEIGHTS_MEMBER,
  LOSS_HISTORY_MEMBER,
  ACHIEVED_WEALTH_MEMBER,
  TERMINAL_RISK_MEMBER,
];

/// Archive entries belonging to one portfolio.
#[derive(Debug)]
struct Group {
  name: String,
  /// Member name -> full archive entry name.
  members: BTreeMap<String, String>,
}

/// Loads results archives against a fixed [`ResultsSchema`].
#[derive(Clone, Debug)]
pub struct ResultsLoader {
  schema: Arc<ResultsSchema>,
}

impl Default for ResultsLoader {
  fn default() -> Self {
    Self {
      schema: Arc::new(ResultsSchema::default()),
    }
  }
}

impl ResultsLoader {
  /// Validates `schema` up front so a bad vocabulary never reaches a file.
  pub fn new(schema: ResultsSchema) -> Result<Self> {
    schema.validate()?;
    Ok(Self {
      schema: Arc::new(schema),
    })
  }

  pub fn schema(&self) -> &ResultsSchema {
    &self.schema
  }

  /// Load every portfolio group in `path`.
  ///
  /// A missing file yields [`LoadError::NotFound`]. Any malformed group aborts
  /// the whole load.
  pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<PortfolioSet> {
    let path = path.as_ref();
    let file = match File::open(path) {
      Ok(file) => file,
      Err(err) if err.kind() == ErrorKind::NotFound => {
        warn!(?path, "results file not found");
        return Err(LoadError::NotFound {
          path: path.to_path_buf(),
        });
      }
      Err(source) => {
        return Err(LoadError::Io {
          path: path.to_path_buf(),
          source,
        })
      }
    };

    let archive_err = |err: ndarray_npy::ReadNpzError| LoadError::Archive {
      path: path.to_path_buf(),
      message: err.to_string(),
    };
    let mut npz = NpzReader::new(BufReader::new(file)).map_err(archive_err)?;
    let names = npz.names().map_err(archive_err)?;
    let groups = discover_groups(&self.schema.group_prefix, &names)?;
    if groups.is_empty() {
      warn!(?path, prefix = %self.schema.group_prefix, "no portfolio groups in archive");
    }

    let mut portfolios = BTreeMap::new();
    for (id, group) in &groups {
      let result = self.read_group(&mut npz, *id, group)?;
      debug!(
        portfolio = %id,
        group = %group.name,
        epochs = result.n_epochs(),
        "loaded portfolio"
      );
      portfolios.insert(*id, result);
    }

    info!(?path, portfolios = portfolios.len(), "loaded results archive");
    Ok(PortfolioSet::new(Arc::clone(&self.schema), portfolios))
  }

  /// Like [`ResultsLoader::load`], but a missing file is `Ok(None)`.
  pub fn load_optional<P: AsRef<Path>>(&self, path: P) -> Result<Option<PortfolioSet>> {
    match self.load(path) {
      Ok(set) => Ok(Some(set)),
      Err(err) if err.is_not_found() => Ok(None),
      Err(err) => Err(err),
    }
  }

  fn read_group<R: Read + Seek>(
    &self,
    npz: &mut NpzReader<R>,
    id: PortfolioId,
    group: &Group,
  ) -> Result<PortfolioResult> {
    let schema = &self.schema;
    for member in REQUIRED_MEMBERS {
      if !group.members.contains_key(member) {
        return Err(LoadError::malformed(
          Some(id),
          member,
          format!("missing from group '{}'", group.name),
        ));
      }
    }

    let weights = read_matrix(
      npz,
      &group.members[WEIGHTS_MEMBER],
      id,
      WEIGHTS_MEMBER,
      Some((schema.n_assets(), schema.horizon_months)),
    )?;
    let history = read_matrix(
      npz,
      &group.members[LOSS_HISTORY_MEMBER],
      id,
      LOSS_HISTORY_MEMBER,
      None,
    )?;
    if history.nrows() != schema.n_loss_columns() {
      return Err(LoadError::malformed(
        Some(id),
        LOSS_HISTORY_MEMBER,
        format!(
          "expected {} rows (columns x epochs on disk), got shape {:?}",
          schema.n_loss_columns(),
          history.dim()
        ),
      ));
    }
    let achieved_wealth = read_scalar(
      npz,
      &group.members[ACHIEVED_WEALTH_MEMBER],
      id,
      ACHIEVED_WEALTH_MEMBER,
    )?;
    let terminal_risk = read_scalar(
      npz,
      &group.members[TERMINAL_RISK_MEMBER],
      id,
      TERMINAL_RISK_MEMBER,
    )?;

    PortfolioResult::try_new(
      id,
      transpose(weights),
      transpose(history),
      achieved_wealth,
      terminal_risk,
      schema,
    )
  }
}

/// Load `path` with the default ETF schema.
pub fn load<P: AsRef<Path>>(path: P) -> Result<PortfolioSet> {
  ResultsLoader::default().load(path)
}

fn transpose(disk: Array2<f64>) -> Array2<f64> {
  disk.reversed_axes().as_standard_layout().into_owned()
}

/// Group archive entries by `<prefix>_<N>`, ascending by `N`.
fn discover_groups(prefix: &str, names: &[String]) -> Result<BTreeMap<PortfolioId, Group>> {
  let mut groups: BTreeMap<PortfolioId, Group> = BTreeMap::new();
  let mut skipped = BTreeSet::new();

  for entry in names {
    let Some((group_name, member)) = entry.split_once('/') else {
      skipped.insert(entry.as_str());
      continue;
    };
    let Some(suffix) = group_name
      .strip_prefix(prefix)
      .and_then(|rest| rest.strip_prefix('_'))
    else {
      skipped.insert(group_name);
      continue;
    };
    let id = suffix.parse::<u32>().map(PortfolioId).map_err(|_| {
      LoadError::malformed(
        None,
        group_name,
        format!("group suffix '{suffix}' is not a non-negative integer"),
      )
    })?;

    let group = groups.entry(id).or_insert_with(|| Group {
      name: group_name.to_string(),
      members: BTreeMap::new(),
    });
    if group.name != group_name {
      return Err(LoadError::malformed(
        Some(id),
        group_name,
        format!("duplicates group '{}'", group.name),
      ));
    }
    let member = member.strip_suffix(".npy").unwrap_or(member);
    group.members.insert(member.to_string(), entry.clone());
  }

  if !skipped.is_empty() {
    debug!(?skipped, "ignored archive entries outside portfolio groups");
  }
  Ok(groups)
}

/// Read a numeric array, coercing `f32` and `i64` payloads to `f64`.
fn read_numeric<R: Read + Seek>(
  npz: &mut NpzReader<R>,
  entry: &str,
  id: PortfolioId,
  field: &str,
) -> Result<ArrayD<f64>> {
  let err = match npz.by_name::<OwnedRepr<f64>, IxDyn>(entry) {
    Ok(arr) => return Ok(arr),
    Err(err) => err,
  };
  if let Ok(arr) = npz.by_name::<OwnedRepr<f32>, IxDyn>(entry) {
    return Ok(arr.mapv(f64::from));
  }
  if let Ok(arr) = npz.by_name::<OwnedRepr<i64>, IxDyn>(entry) {
    return Ok(arr.mapv(|v| v as f64));
  }
  Err(LoadError::malformed(
    Some(id),
    field,
    format!("not coercible to f64: {err}"),
  ))
}

fn read_matrix<R: Read + Seek>(
  npz: &mut NpzReader<R>,
  entry: &str,
  id: PortfolioId,
  field: &str,
  expected: Option<(usize, usize)>,
) -> Result<Array2<f64>> {
  let arr = read_numeric(npz, entry, id, field)?;
  let shape = arr.shape().to_vec();
  let matrix = arr.into_dimensionality::<Ix2>().map_err(|_| {
    LoadError::malformed(
      Some(id),
      field,
      format!("expected a 2-D array, got shape {shape:?}"),
    )
  })?;

  if let Some(expected) = expected {
    if matrix.dim() != expected {
      return Err(LoadError::malformed(
        Some(id),
        field,
        format!(
          "expected on-disk shape {:?}, got {:?}",
          expected,
          matrix.dim()
        ),
      ));
    }
  }
  Ok(matrix)
}

fn read_scalar<R: Read + Seek>(
  npz: &mut NpzReader<R>,
  entry: &str,
  id: PortfolioId,
  field: &str,
) -> Result<f64> {
  let arr = read_numeric(npz, entry, id, field)?;
  if arr.len() != 1 {
    return Err(LoadError::malformed(
      Some(id),
      field,
      format!("expected a scalar, got shape {:?}", arr.shape()),
    ));
  }
  arr
    .iter()
    .next()
    .copied()
    .ok_or_else(|| LoadError::malformed(Some(id), field, "empty array"))
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::Array0;
  use ndarray::Array1;
  use ndarray::Array2;
  use ndarray_npy::NpzWriter;
  use tempfile::tempdir;
  use tracing_test::traced_test;

  use super::*;
  use crate::fixtures::FixturePortfolio;
  use crate::fixtures::write_archive;

  /// 3 assets over 5 months, 8 loss columns over 4 epochs.
  fn small_schema() -> ResultsSchema {
    ResultsSchema::with_assets(&["A", "B", "C"], 5)
  }

  fn ramp_portfolio(id: u32) -> FixturePortfolio {
    // Distinct per (asset, month) so a missing transpose cannot go unnoticed.
    let mut disk = Array2::zeros((3, 5));
    for m in 0..5 {
      let a = 0.1 + 0.02 * m as f64;
      let b = 0.3 - 0.01 * m as f64;
      disk[[0, m]] = a;
      disk[[1, m]] = b;
      disk[[2, m]] = 1.0 - a - b;
    }
    FixturePortfolio::new(id, disk, FixturePortfolio::loss_on_disk(8, 4), 1.1, 0.2)
  }

  #[test]
  fn transposes_weights_and_loss_history() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("results.npz");
    let fixture = ramp_portfolio(1);
    write_archive(&path, "point", &[fixture.clone()]);

    let loader = ResultsLoader::new(small_schema()).unwrap();
    let set = loader.load(&path).unwrap();
    let result = set.get(PortfolioId(1)).unwrap();

    assert_eq!(result.weights().dim(), (5, 3));
    assert_eq!(result.loss_history().dim(), (4, 8));
    for month in 0..5 {
      for asset in 0..3 {
        assert_eq!(
          result.weights()[[month, asset]],
          fixture.weights[[asset, month]]
        );
      }
    }
    for epoch in 0..4 {
      for col in 0..8 {
        assert_eq!(
          result.loss_history()[[epoch, col]],
          fixture.loss_history[[col, epoch]]
        );
      }
    }
    assert_eq!(result.epochs().to_vec(), vec![1.0, 2.0, 3.0, 4.0]);
    assert_abs_diff_eq!(result.achieved_wealth(), 1.1);
    assert_abs_diff_eq!(result.terminal_risk(), 0.2);
  }

  #[test]
  fn loaded_rows_sum_to_one_and_are_non_negative() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("results.npz");
    write_archive(&path, "point", &[ramp_portfolio(1), ramp_portfolio(2)]);

    let set = ResultsLoader::new(small_schema()).unwrap().load(&path).unwrap();
    for (_, result) in &set {
      for row in result.weights().rows() {
        assert!((row.sum() - 1.0).abs() <= 1e-6);
        assert!(row.iter().all(|w| *w >= 0.0));
      }
    }
  }

  #[test]
  fn orders_groups_by_numeric_suffix() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("results.npz");
    write_archive(
      &path,
      "point",
      &[ramp_portfolio(10), ramp_portfolio(2), ramp_portfolio(1)],
    );

    let set = ResultsLoader::new(small_schema()).unwrap().load(&path).unwrap();
    assert_eq!(
      set.ids(),
      vec![PortfolioId(1), PortfolioId(2), PortfolioId(10)]
    );
  }

  #[test]
  #[traced_test]
  fn missing_file_is_not_found() {
    let err = load("/nonexistent/path").unwrap_err();
    assert!(err.is_not_found());
    assert!(logs_contain("results file not found"));

    let none = ResultsLoader::default()
      .load_optional("/nonexistent/path")
      .unwrap();
    assert!(none.is_none());
  }

  #[test]
  fn rejects_non_archive_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("results.npz");
    std::fs::write(&path, b"definitely not a zip archive").unwrap();

    let err = ResultsLoader::default().load(&path).unwrap_err();
    assert!(matches!(err, LoadError::Archive { .. }));
  }

  #[test]
  fn missing_member_aborts_whole_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("results.npz");
    let good = ramp_portfolio(1);
    {
      let mut npz = NpzWriter::new(File::create(&path).unwrap());
      good.add_to(&mut npz, "point");
      npz
        .add_array("point_2/weights.npy", &ramp_portfolio(2).weights)
        .unwrap();
      npz.finish().unwrap();
    }

    let err = ResultsLoader::new(small_schema())
      .unwrap()
      .load(&path)
      .unwrap_err();
    match err {
      LoadError::MalformedData {
        portfolio, field, ..
      } => {
        assert_eq!(portfolio, Some(PortfolioId(2)));
        assert_eq!(field, LOSS_HISTORY_MEMBER);
      }
      other => panic!("unexpected error {other:?}"),
    }
  }

  #[test]
  fn rejects_already_transposed_weights() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("results.npz");
    let mut fixture = ramp_portfolio(4);
    fixture.weights = fixture.weights.t().to_owned();
    write_archive(&path, "point", &[fixture]);

    let err = ResultsLoader::new(small_schema())
      .unwrap()
      .load(&path)
      .unwrap_err();
    assert!(err.to_string().contains("on-disk shape (3, 5)"));
  }

  #[test]
  fn rejects_loss_history_with_wrong_column_count() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("results.npz");
    let mut fixture = ramp_portfolio(1);
    fixture.loss_history = FixturePortfolio::loss_on_disk(7, 4);
    write_archive(&path, "point", &[fixture]);

    let err = ResultsLoader::new(small_schema())
      .unwrap()
      .load(&path)
      .unwrap_err();
    assert!(matches!(
      err,
      LoadError::MalformedData { ref field, .. } if field == LOSS_HISTORY_MEMBER
    ));
  }

  #[test]
  fn coerces_f32_payloads_and_single_element_scalars() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("results.npz");
    let fixture = ramp_portfolio(1);
    {
      let mut npz = NpzWriter::new(File::create(&path).unwrap());
      npz
        .add_array("point_1/weights.npy", &fixture.weights.mapv(|v| v as f32))
        .unwrap();
      npz
        .add_array("point_1/loss_history.npy", &fixture.loss_history)
        .unwrap();
      npz
        .add_array("point_1/achieved_wealth.npy", &Array1::from(vec![1.25f64]))
        .unwrap();
      npz
        .add_array("point_1/terminal_cCVaR.npy", &Array0::from_elem((), 3i64))
        .unwrap();
      npz.finish().unwrap();
    }

    let set = ResultsLoader::new(small_schema()).unwrap().load(&path).unwrap();
    let result = set.get(PortfolioId(1)).unwrap();
    assert_abs_diff_eq!(result.achieved_wealth(), 1.25);
    assert_abs_diff_eq!(result.terminal_risk(), 3.0);
    assert_abs_diff_eq!(result.weights()[[0, 0]], 0.1, epsilon = 1e-6);
  }

  #[test]
  fn rejects_vector_where_scalar_expected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("results.npz");
    let fixture = ramp_portfolio(1);
    {
      let mut npz = NpzWriter::new(File::create(&path).unwrap());
      npz.add_array("point_1/weights.npy", &fixture.weights).unwrap();
      npz
        .add_array("point_1/loss_history.npy", &fixture.loss_history)
        .unwrap();
      npz
        .add_array("point_1/achieved_wealth.npy", &Array1::from(vec![1.0, 1.1]))
        .unwrap();
      npz
        .add_array("point_1/terminal_cCVaR.npy", &Array0::from_elem((), 0.1))
        .unwrap();
      npz.finish().unwrap();
    }

    let err = ResultsLoader::new(small_schema())
      .unwrap()
      .load(&path)
      .unwrap_err();
    assert!(err.to_string().contains(ACHIEVED_WEALTH_MEMBER));
  }

  #[test]
  fn discover_groups_skips_foreign_entries_and_rejects_bad_suffix() {
    let names = vec![
      "point_3/weights.npy".to_string(),
      "point_3/loss_history.npy".to_string(),
      "metadata.npy".to_string(),
      "other_1/weights.npy".to_string(),
    ];
    let groups = discover_groups("point", &names).unwrap();
    assert_eq!(groups.len(), 1);
    assert!(groups[&PortfolioId(3)].members.contains_key("weights"));

    let names = vec!["point_x/weights.npy".to_string()];
    assert!(discover_groups("point", &names).is_err());

    let names = vec![
      "point_1/weights.npy".to_string(),
      "point_01/weights.npy".to_string(),
    ];
    assert!(discover_groups("point", &names).is_err());
  }

  #[test]
  fn empty_archive_loads_as_empty_set() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("results.npz");
    write_archive(&path, "point", &[]);

    let set = ResultsLoader::default().load(&path).unwrap();
    assert!(set.is_empty());
  }
}
