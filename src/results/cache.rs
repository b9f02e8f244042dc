//! # Results Cache
//!
//! Process-wide memoization of loaded archives keyed by path. Entries are
//! populated lazily and never invalidated. Each path has its own slot lock, so
//! at most one thread reads a given file while concurrent callers wait for it.
//! Failed loads are not stored.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::OnceLock;

use parking_lot::Mutex;
use tracing::debug;

use super::loader::ResultsLoader;
use super::types::PortfolioSet;
use crate::error::Result;

type Slot = Arc<Mutex<Option<Arc<PortfolioSet>>>>;

/// Memoizing front for a [`ResultsLoader`].
#[derive(Debug, Default)]
pub struct ResultsCache {
  loader: ResultsLoader,
  slots: Mutex<HashMap<PathBuf, Slot>>,
}

impl ResultsCache {
  pub fn new(loader: ResultsLoader) -> Self {
    Self {
      loader,
      slots: Mutex::new(HashMap::new()),
    }
  }

  /// Shared cache using the default ETF schema.
  pub fn global() -> &'static ResultsCache {
    static GLOBAL: OnceLock<ResultsCache> = OnceLock::new();
    GLOBAL.get_or_init(ResultsCache::default)
  }

  pub fn loader(&self) -> &ResultsLoader {
    &self.loader
  }

  /// Cached set for `path`, loading it on first use.
  pub fn get_or_load<P: AsRef<Path>>(&self, path: P) -> Result<Arc<PortfolioSet>> {
    let path = path.as_ref();
    let slot = {
      let mut slots = self.slots.lock();
      Arc::clone(slots.entry(path.to_path_buf()).or_default())
    };

    let mut cached = slot.lock();
    if let Some(set) = cached.as_ref() {
      debug!(?path, "results cache hit");
      return Ok(Arc::clone(set));
    }

    debug!(?path, "results cache miss");
    let set = match self.loader.load(path) {
      Ok(set) => Arc::new(set),
      Err(err) => {
        drop(cached);
        self.forget_empty(path, &slot);
        return Err(err);
      }
    };
    *cached = Some(Arc::clone(&set));
    Ok(set)
  }

  /// Drop the slot of `path` if it is still `slot`, holds nothing and no other
  /// caller is waiting on it, so failing paths do not accumulate.
  fn forget_empty(&self, path: &Path, slot: &Slot) {
    let mut slots = self.slots.lock();
    // Only the map and `slot` itself may reference it; never block on a slot
    // lock while the map lock is held.
    let stale = slots.get(path).is_some_and(|current| {
      Arc::ptr_eq(current, slot)
        && Arc::strong_count(current) == 2
        && current.try_lock().is_some_and(|cached| cached.is_none())
    });
    if stale {
      slots.remove(path);
    }
  }

  /// Like [`ResultsCache::get_or_load`], but a missing file is `Ok(None)`.
  pub fn get_or_load_optional<P: AsRef<Path>>(&self, path: P) -> Result<Option<Arc<PortfolioSet>>> {
    match self.get_or_load(path) {
      Ok(set) => Ok(Some(set)),
      Err(err) if err.is_not_found() => Ok(None),
      Err(err) => Err(err),
    }
  }

  /// `true` once `path` has been loaded successfully.
  pub fn contains<P: AsRef<Path>>(&self, path: P) -> bool {
    let slot = self.slots.lock().get(path.as_ref()).cloned();
    slot.is_some_and(|slot| slot.lock().is_some())
  }

  /// Number of path slots held, loaded or being loaded.
  pub fn slot_count(&self) -> usize {
    self.slots.lock().len()
  }

  /// Number of successfully loaded paths.
  pub fn len(&self) -> usize {
    let slots: Vec<Slot> = self.slots.lock().values().cloned().collect();
    slots.iter().filter(|slot| slot.lock().is_some()).count()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
