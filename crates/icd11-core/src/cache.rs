//! Session-owned memo of loaded catalogs.
//!
//! Entries are keyed by source path and remember the file's modification
//! time and length when it was read. A lookup re-reads the file only when
//! that version changed or the entry was invalidated. Failed loads are never
//! stored, so a source that shows up later is picked up on the next call.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use tracing::{debug, info, warn};

use crate::catalog::load_catalog;
use crate::{Catalog, CatalogError};

/// Identity of one version of a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceVersion {
    modified: Option<SystemTime>,
    len: u64,
}

impl SourceVersion {
    pub fn probe(path: &Path) -> Result<Self, CatalogError> {
        let meta = fs::metadata(path).map_err(|source| CatalogError::SourceUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            modified: meta.modified().ok(),
            len: meta.len(),
        })
    }
}

#[derive(Debug)]
struct Entry {
    version: SourceVersion,
    catalog: Arc<Catalog>,
}

/// Result of a load that is allowed to degrade. `warning` carries the reason
/// when `catalog` is the empty fallback.
#[derive(Debug)]
pub struct LoadOutcome {
    pub catalog: Arc<Catalog>,
    pub warning: Option<CatalogError>,
}

#[derive(Debug, Default)]
pub struct CatalogCache {
    entries: Mutex<HashMap<PathBuf, Entry>>,
    preview_rows: usize,
}

impl CatalogCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log this many rows at debug level after each fresh load.
    pub fn with_preview_rows(mut self, rows: usize) -> Self {
        self.preview_rows = rows;
        self
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<PathBuf, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The catalog for `path`, reading the file only if it is new or changed.
    pub fn get_or_load(&self, path: &Path) -> Result<Arc<Catalog>, CatalogError> {
        let version = SourceVersion::probe(path)?;
        if let Some(entry) = self.entries().get(path) {
            if entry.version == version {
                debug!(path = %path.display(), "catalog cache hit");
                return Ok(Arc::clone(&entry.catalog));
            }
            info!(path = %path.display(), "catalog source changed, reloading");
        }

        let catalog = Arc::new(load_catalog(path)?);
        catalog.log_preview(self.preview_rows);
        self.entries().insert(
            path.to_path_buf(),
            Entry {
                version,
                catalog: Arc::clone(&catalog),
            },
        );
        Ok(catalog)
    }

    /// Like [`get_or_load`](Self::get_or_load), but an unavailable source
    /// yields an empty catalog and the error as a warning.
    pub fn load_or_empty(&self, path: &Path) -> LoadOutcome {
        match self.get_or_load(path) {
            Ok(catalog) => LoadOutcome {
                catalog,
                warning: None,
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "catalog unavailable, continuing with an empty catalog");
                LoadOutcome {
                    catalog: Arc::new(Catalog::empty()),
                    warning: Some(e),
                }
            }
        }
    }

    /// Drop the entry for `path`. Returns whether one was cached.
    pub fn invalidate(&self, path: &Path) -> bool {
        let removed = self.entries().remove(path).is_some();
        if removed {
            info!(path = %path.display(), "catalog cache invalidated");
        }
        removed
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries().contains_key(path)
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}
